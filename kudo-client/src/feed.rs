use std::collections::HashSet;

use anyhow::Context;

use crate::{
    api::{
        Backend, Engagement, EntityRef, Mutation, Page, Post, PostId, ReactionType, UserId,
        VoteDirection, DEFAULT_FEED_LIMIT,
    },
    MutationId, RemoteCall, SyncController, SyncError,
};

/// Outcome of fetching one more page
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Loaded {
    /// Entities the backend returned
    pub fetched: usize,

    /// Those that were not loaded yet
    pub added: usize,
}

impl Loaded {
    /// The backend has nothing past the previous page
    ///
    /// A page made only of entities that were already loaded is not the end: new
    /// ones were created since and pushed everything down.
    pub fn exhausted(&self) -> bool {
        self.fetched == 0
    }
}

/// Posts that break an invariant of ours (a user both up and down voting, a NUL
/// byte) are left out rather than shown wrong
fn keep_valid(posts: Vec<Post>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|p| match p.validate() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(post=?p.id, %error, "dropping invalid post from the backend");
                false
            }
        })
        .collect()
}

/// The home feed: posts newest first, as the backend serves them
#[derive(Debug)]
pub struct Feed {
    posts: Vec<Post>,
    /// Last page that was loaded
    page: Page,
    sync: SyncController,
}

impl Feed {
    /// A `limit` of 0 uses the backend's default page size
    pub fn new(actor: UserId, limit: u32) -> Feed {
        let limit = match limit {
            0 => DEFAULT_FEED_LIMIT,
            l => l,
        };
        Feed {
            posts: Vec::new(),
            // Nothing loaded yet, so that `load_more` starts at page 1
            page: Page::new(0, limit),
            sync: SyncController::new(actor),
        }
    }

    pub fn sync(&self) -> &SyncController {
        &self.sync
    }

    /// Posts with the local votes and reactions applied
    pub fn posts(&self) -> Vec<Post> {
        self.posts.iter().map(|p| self.overlay(p)).collect()
    }

    pub fn post(&self, id: &PostId) -> Option<Post> {
        self.posts.iter().find(|p| p.id == *id).map(|p| self.overlay(p))
    }

    fn overlay(&self, p: &Post) -> Post {
        let mut res = p.clone();
        if let Some(e) = self.sync.engagement(&EntityRef::Post(p.id.clone())) {
            res.engagement = e.clone();
        }
        res
    }

    /// Reloads the first page, replacing everything that was loaded
    pub async fn refresh<B>(&mut self, backend: &mut B) -> anyhow::Result<()>
    where
        B: ?Sized + Backend,
    {
        let page = Page::new(1, self.page.limit);
        let posts = keep_valid(
            backend
                .get_feed(page)
                .await
                .context("fetching the feed")?,
        );
        tracing::debug!(count = posts.len(), "refreshed feed");

        let kept = posts.iter().map(|p| &p.id).collect::<HashSet<_>>();
        for p in &self.posts {
            if !kept.contains(&p.id) {
                self.sync.forget(&EntityRef::Post(p.id.clone()));
            }
        }
        for p in &posts {
            self.sync
                .load(EntityRef::Post(p.id.clone()), p.engagement.clone());
        }
        self.posts = posts;
        self.page = page;
        Ok(())
    }

    /// Appends the next page
    pub async fn load_more<B>(&mut self, backend: &mut B) -> anyhow::Result<Loaded>
    where
        B: ?Sized + Backend,
    {
        let page = self.page.next();
        let posts = backend
            .get_feed(page)
            .await
            .with_context(|| format!("fetching page {} of the feed", page.page))?;
        let fetched = posts.len();

        let known = self.posts.iter().map(|p| p.id.clone()).collect::<HashSet<_>>();
        let mut added = 0;
        for p in keep_valid(posts) {
            if known.contains(&p.id) {
                // A post was created since the previous page, shifting everything
                tracing::trace!(post=?p.id, "skipping post already in the feed");
                continue;
            }
            self.sync
                .load(EntityRef::Post(p.id.clone()), p.engagement.clone());
            self.posts.push(p);
            added += 1;
        }
        self.page = page;
        tracing::debug!(page = page.page, fetched, added, "loaded more of the feed");
        Ok(Loaded { fetched, added })
    }

    /// Shows the vote right away, the returned call still has to be sent and
    /// its outcome passed to `settle`
    pub fn begin_vote(
        &mut self,
        post: &PostId,
        direction: VoteDirection,
    ) -> Result<RemoteCall, SyncError> {
        self.sync
            .start(EntityRef::Post(post.clone()), Mutation::Vote(direction))
    }

    pub fn begin_react(
        &mut self,
        post: &PostId,
        reaction: ReactionType,
    ) -> Result<RemoteCall, SyncError> {
        self.sync
            .start(EntityRef::Post(post.clone()), Mutation::React(reaction))
    }

    /// Commits or rolls back a call started with `begin_*`, in any order
    pub fn settle(
        &mut self,
        call: MutationId,
        outcome: anyhow::Result<()>,
    ) -> Result<Engagement, SyncError> {
        self.sync.resolve(call, outcome)
    }

    pub async fn vote<B>(
        &mut self,
        backend: &mut B,
        post: &PostId,
        direction: VoteDirection,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_vote(post, direction)?;
        let outcome = call.send(backend).await;
        self.settle(call.id, outcome)
    }

    pub async fn react<B>(
        &mut self,
        backend: &mut B,
        post: &PostId,
        reaction: ReactionType,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_react(post, reaction)?;
        let outcome = call.send(backend).await;
        self.settle(call.id, outcome)
    }

    pub async fn delete_post<B>(&mut self, backend: &mut B, post: &PostId) -> anyhow::Result<()>
    where
        B: ?Sized + Backend,
    {
        backend
            .delete_post(post)
            .await
            .with_context(|| format!("deleting post {}", post.0))?;
        self.posts.retain(|p| p.id != *post);
        self.sync.forget(&EntityRef::Post(post.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::VoteSet;

    #[test]
    fn posts_breaking_invariants_are_left_out() {
        let mut both_ways = Post::stub("both");
        both_ways.engagement.votes = VoteSet {
            upvoters: [UserId::from("u")].into_iter().collect(),
            downvoters: [UserId::from("u")].into_iter().collect(),
        };
        let mut nul = Post::stub("nul");
        nul.content = String::from("a\0b");
        let fine = Post::stub("fine");

        let kept = keep_valid(vec![both_ways, fine.clone(), nul]);
        assert_eq!(kept, vec![fine]);

        let empty = Loaded {
            fetched: 0,
            added: 0,
        };
        assert!(empty.exhausted());
        assert!(!Loaded {
            fetched: 3,
            added: 0
        }
        .exhausted());
    }
}
