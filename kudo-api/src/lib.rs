use chrono::Utc;

mod backend;
pub use backend::{Backend, Page, DEFAULT_COMMENTS_LIMIT, DEFAULT_FEED_LIMIT};

mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod engagement;
pub use engagement::{
    Engagement, Mutation, ReactionEntry, ReactionSet, ReactionType, VoteDirection, VoteSet,
};

mod entity;
pub use entity::EntityRef;

mod error;
pub use error::Error;

mod post;
pub use post::{
    NewPost, Post, PostId, Reference, ReferenceTarget, ReferenceType, Visibility, MAX_POST_IMAGES,
};

mod user;
pub use user::{Author, AuthorRef, UserId};

mod fuzz;

pub type Time = chrono::DateTime<Utc>;

/// Id used by every `stub()` constructor
pub const STUB_ID: &str = "ffffffffffffffffffffffff";

/// Bearer token handed out by the backend's auth routes
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(String::from(STUB_ID))
    }
}

/// Body the backend returns for deletions and for every error
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Message {
    pub message: String,
}

pub fn stub_time() -> Time {
    Time::from(std::time::UNIX_EPOCH)
}

// The backend stores strings in mongodb, which is fine with NUL bytes, but nothing
// downstream of it is, so reject them at the edges.
pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

/// Content must be non-blank after trimming, as the backend trims before saving
pub fn validate_content(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    match s.trim().is_empty() {
        true => Err(Error::InvalidArgument(String::from("content is required"))),
        false => Ok(()),
    }
}
