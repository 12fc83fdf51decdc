use crate::{AuthorRef, Engagement, Time, UserId, STUB_ID};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn stub() -> PostId {
        PostId(String::from(STUB_ID))
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> PostId {
        PostId(String::from(s))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Friends,
    Private,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum ReferenceType {
    GeoSession,
    ProgramSession,
    FoodLog,
    Post,
}

/// `reference.item_id` is populated on the feed route and a bare id elsewhere
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum ReferenceTarget {
    Id(String),
    Populated(serde_json::Value),
}

/// Activity a post was shared from
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Reference {
    pub item_id: ReferenceTarget,
    pub item_type: ReferenceType,
}

fn untitled() -> String {
    String::from("Untitled")
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    pub user: AuthorRef,
    #[serde(default = "untitled")]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(flatten)]
    pub engagement: Engagement,
    /// Only filled in by the feed route
    #[serde(
        rename = "commentCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub comment_count: Option<u64>,
    #[serde(rename = "createdAt")]
    pub created_at: Time,
}

impl Post {
    pub fn stub(id: &str) -> Post {
        Post {
            id: PostId::from(id),
            user: AuthorRef::Id(UserId::stub()),
            title: untitled(),
            content: String::new(),
            images: Vec::new(),
            visibility: Visibility::Public,
            reference: None,
            engagement: Engagement::default(),
            comment_count: None,
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
        crate::validate_string(&self.title)?;
        crate::validate_string(&self.content)?;
        self.engagement.votes.validate()
    }
}

pub const MAX_POST_IMAGES: usize = 10;

/// Body of `POST /posts`, images already uploaded
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl NewPost {
    pub fn new(content: String) -> NewPost {
        NewPost {
            content,
            ..NewPost::default()
        }
    }

    /// A shared activity may come without any text
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(t) = &self.title {
            crate::validate_string(t)?;
        }
        crate::validate_string(&self.content)?;
        if self.content.trim().is_empty() && self.reference.is_none() {
            return Err(crate::Error::InvalidArgument(String::from(
                "Post must have content or a reference",
            )));
        }
        if self.images.len() > MAX_POST_IMAGES {
            return Err(crate::Error::InvalidArgument(format!(
                "Maximum {MAX_POST_IMAGES} images allowed"
            )));
        }
        Ok(())
    }

    /// Title that will be stored, the backend fills in blanks
    pub fn title_or_default(&self) -> String {
        match &self.title {
            Some(t) if !t.is_empty() => t.clone(),
            _ => untitled(),
        }
    }
}
