use crate::{AuthorRef, Engagement, PostId, Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl From<&str> for CommentId {
    fn from(s: &str) -> CommentId {
        CommentId(String::from(s))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    #[serde(rename = "post")]
    pub post_id: PostId,
    /// None for top-level comments
    #[serde(rename = "parentComment", default)]
    pub parent_id: Option<CommentId>,
    pub user: AuthorRef,
    pub content: String,
    #[serde(flatten)]
    pub engagement: Engagement,
    #[serde(rename = "createdAt")]
    pub created_at: Time,
}

impl Comment {
    pub fn stub(id: &str, parent_id: Option<&str>) -> Comment {
        Comment {
            id: CommentId::from(id),
            post_id: PostId::stub(),
            parent_id: parent_id.map(CommentId::from),
            user: AuthorRef::Id(UserId::stub()),
            content: String::new(),
            engagement: Engagement::default(),
            created_at: crate::stub_time(),
        }
    }

    pub fn author_id(&self) -> &UserId {
        self.user.id()
    }

    pub fn score(&self) -> i64 {
        self.engagement.score()
    }

    // See `validate_string` in lib.rs
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_string(&self.content)?;
        self.engagement.votes.validate()
    }
}

/// Body of `POST /comments`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    #[serde(rename = "postId")]
    pub post_id: PostId,
    pub content: String,
    #[serde(rename = "parentCommentId")]
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn new(post_id: PostId, content: String, parent_id: Option<CommentId>) -> NewComment {
        NewComment {
            post_id,
            content,
            parent_id,
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_string(&self.post_id.0)?;
        crate::validate_content(&self.content)?;
        if let Some(p) = &self.parent_id {
            crate::validate_string(&p.0)?;
        }
        Ok(())
    }
}
