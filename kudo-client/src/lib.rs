mod comment;
pub use comment::{build_tree, CommentNode, CommentTree, DropReason, DroppedComment};

mod discussion;
pub use discussion::Discussion;

mod feed;
pub use feed::{Feed, Loaded};

mod sync;
pub use sync::{
    MutationId, MutationStatus, PendingMutation, RemoteCall, SyncController, SyncError,
};

mod fuzz;

pub mod api {
    pub use kudo_api::*;
}
