use std::fmt;

use crate::STUB_ID;

#[derive(
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    bolero::generator::TypeGenerator,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn stub() -> UserId {
        UserId(String::from(STUB_ID))
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> UserId {
        UserId(String::from(s))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User profile as populated by the backend (`username name profilePicture email`)
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "profilePicture",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The `user` field of posts and comments: a bare id unless the route populated it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Id(UserId),
    Profile(Author),
}

impl AuthorRef {
    pub fn id(&self) -> &UserId {
        match self {
            AuthorRef::Id(id) => id,
            AuthorRef::Profile(a) => &a.id,
        }
    }

    /// Name to show for this author, if the backend sent a profile
    pub fn display_name(&self) -> Option<&str> {
        match self {
            AuthorRef::Id(_) => None,
            AuthorRef::Profile(a) => a.name.as_deref().or(a.username.as_deref()),
        }
    }
}

impl From<UserId> for AuthorRef {
    fn from(id: UserId) -> AuthorRef {
        AuthorRef::Id(id)
    }
}
