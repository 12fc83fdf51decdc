use std::fmt;

use crate::{CommentId, PostId};

/// Anything that carries votes and reactions
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub enum EntityRef {
    Post(PostId),
    Comment(CommentId),
}

impl From<PostId> for EntityRef {
    fn from(id: PostId) -> EntityRef {
        EntityRef::Post(id)
    }
}

impl From<CommentId> for EntityRef {
    fn from(id: CommentId) -> EntityRef {
        EntityRef::Comment(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Post(id) => write!(f, "post {}", id.0),
            EntityRef::Comment(id) => write!(f, "comment {}", id.0),
        }
    }
}
