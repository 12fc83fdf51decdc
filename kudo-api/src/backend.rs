use async_trait::async_trait;

use crate::{Comment, CommentId, NewComment, Post, PostId, ReactionType, VoteDirection};

pub const DEFAULT_FEED_LIMIT: u32 = 20;
pub const DEFAULT_COMMENTS_LIMIT: u32 = 50;

/// 1-based pagination, as the backend's `?page=&limit=` query
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Page {
        Page { page, limit }
    }

    pub fn feed() -> Page {
        Page::new(1, DEFAULT_FEED_LIMIT)
    }

    pub fn comments() -> Page {
        Page::new(1, DEFAULT_COMMENTS_LIMIT)
    }

    /// The backend reads `0` as "not set" for both fields
    pub fn normalized(self, default_limit: u32) -> Page {
        Page {
            page: if self.page == 0 { 1 } else { self.page },
            limit: if self.limit == 0 {
                default_limit
            } else {
                self.limit
            },
        }
    }

    pub fn next(self) -> Page {
        Page {
            page: self.page.saturating_add(1),
            limit: self.limit,
        }
    }

    /// Number of items to skip before this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }
}

/// The remote REST API, as seen by the acting user
///
/// Every transport failure, non-success answer and timeout is an `Err`.
#[async_trait]
pub trait Backend: Send {
    async fn get_feed(&mut self, page: Page) -> anyhow::Result<Vec<Post>>;
    async fn get_comments_by_post(
        &mut self,
        post: &PostId,
        page: Page,
    ) -> anyhow::Result<Vec<Comment>>;
    async fn create_comment(&mut self, comment: NewComment) -> anyhow::Result<Comment>;
    async fn delete_post(&mut self, post: &PostId) -> anyhow::Result<()>;
    async fn delete_comment(&mut self, comment: &CommentId) -> anyhow::Result<()>;

    async fn vote_post(&mut self, post: &PostId, direction: VoteDirection)
        -> anyhow::Result<Post>;
    /// Reacts to a post (the route is still named after the old "like" button)
    async fn like_post(&mut self, post: &PostId, reaction: ReactionType) -> anyhow::Result<Post>;
    async fn vote_comment(
        &mut self,
        comment: &CommentId,
        direction: VoteDirection,
    ) -> anyhow::Result<Comment>;
    async fn react_comment(
        &mut self,
        comment: &CommentId,
        reaction: ReactionType,
    ) -> anyhow::Result<Comment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_like_the_backend() {
        assert_eq!(Page::new(0, 0).normalized(20), Page::new(1, 20));
        assert_eq!(Page::new(3, 0).normalized(50), Page::new(3, 50));
        assert_eq!(Page::new(2, 10).normalized(20), Page::new(2, 10));
    }

    #[test]
    fn offsets() {
        assert_eq!(Page::feed().offset(), 0);
        assert_eq!(Page::feed().next().offset(), 20);
        assert_eq!(Page::new(3, 50).offset(), 100);
    }
}
