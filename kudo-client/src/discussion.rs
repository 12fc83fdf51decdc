use std::collections::HashSet;

use anyhow::Context;

use crate::{
    api::{
        Backend, Comment, CommentId, Engagement, EntityRef, Mutation, NewComment, Page, Post,
        ReactionType, UserId, VoteDirection, DEFAULT_COMMENTS_LIMIT,
    },
    CommentTree, Loaded, MutationId, RemoteCall, SyncController, SyncError,
};

fn keep_valid(comments: Vec<Comment>) -> Vec<Comment> {
    comments
        .into_iter()
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(comment=?c.id, %error, "dropping invalid comment from the backend");
                false
            }
        })
        .collect()
}

/// One post and the comments below it
#[derive(Debug)]
pub struct Discussion {
    post: Post,
    comments: Vec<Comment>,
    /// Last page of comments that was loaded
    page: Page,
    sync: SyncController,
}

impl Discussion {
    /// Comments are not loaded until the first `refresh`
    pub fn new(actor: UserId, post: Post) -> Discussion {
        Discussion::with_limit(actor, post, DEFAULT_COMMENTS_LIMIT)
    }

    pub fn with_limit(actor: UserId, post: Post, limit: u32) -> Discussion {
        let mut sync = SyncController::new(actor);
        sync.load(EntityRef::Post(post.id.clone()), post.engagement.clone());
        Discussion {
            post,
            comments: Vec::new(),
            page: Page::new(
                0,
                match limit {
                    0 => DEFAULT_COMMENTS_LIMIT,
                    l => l,
                },
            ),
            sync,
        }
    }

    /// Builds the discussion for `post` and loads its comments
    pub async fn open<B>(backend: &mut B, actor: UserId, post: Post) -> anyhow::Result<Discussion>
    where
        B: ?Sized + Backend,
    {
        let mut res = Discussion::new(actor, post);
        res.refresh(backend).await?;
        Ok(res)
    }

    pub fn sync(&self) -> &SyncController {
        &self.sync
    }

    pub fn post(&self) -> Post {
        let mut res = self.post.clone();
        if let Some(e) = self.sync.engagement(&EntityRef::Post(res.id.clone())) {
            res.engagement = e.clone();
        }
        res
    }

    /// Comments with the local votes and reactions applied, in fetch order
    pub fn comments(&self) -> Vec<Comment> {
        self.comments
            .iter()
            .map(|c| {
                let mut res = c.clone();
                if let Some(e) = self.sync.engagement(&EntityRef::Comment(c.id.clone())) {
                    res.engagement = e.clone();
                }
                res
            })
            .collect()
    }

    pub fn tree(&self) -> CommentTree {
        CommentTree::build(&self.comments())
    }

    /// Refetches the first page of comments, overwriting local engagement with
    /// the backend's
    pub async fn refresh<B>(&mut self, backend: &mut B) -> anyhow::Result<()>
    where
        B: ?Sized + Backend,
    {
        let page = Page::new(1, self.page.limit);
        let comments = keep_valid(
            backend
                .get_comments_by_post(&self.post.id, page)
                .await
                .with_context(|| format!("fetching comments of post {}", self.post.id.0))?,
        );
        tracing::debug!(post=?self.post.id, count = comments.len(), "refreshed comments");

        let kept = comments.iter().map(|c| &c.id).collect::<HashSet<_>>();
        for c in &self.comments {
            if !kept.contains(&c.id) {
                self.sync.forget(&EntityRef::Comment(c.id.clone()));
            }
        }
        for c in &comments {
            self.sync
                .load(EntityRef::Comment(c.id.clone()), c.engagement.clone());
        }
        self.comments = comments;
        self.page = page;
        Ok(())
    }

    /// Appends the next page of comments
    ///
    /// Replies on that page whose parent sits on an earlier page get attached
    /// once both are loaded.
    pub async fn load_more<B>(&mut self, backend: &mut B) -> anyhow::Result<Loaded>
    where
        B: ?Sized + Backend,
    {
        let page = self.page.next();
        let comments = backend
            .get_comments_by_post(&self.post.id, page)
            .await
            .with_context(|| {
                format!("fetching page {} of comments of post {}", page.page, self.post.id.0)
            })?;
        let fetched = comments.len();

        let known = self.comments.iter().map(|c| c.id.clone()).collect::<HashSet<_>>();
        let mut added = 0;
        for c in keep_valid(comments) {
            if known.contains(&c.id) {
                // A comment was deleted since the previous page, shifting everything
                tracing::trace!(comment=?c.id, "skipping comment already loaded");
                continue;
            }
            self.sync
                .load(EntityRef::Comment(c.id.clone()), c.engagement.clone());
            self.comments.push(c);
            added += 1;
        }
        self.page = page;
        tracing::debug!(post=?self.post.id, page = page.page, fetched, added, "loaded more comments");
        Ok(Loaded { fetched, added })
    }

    /// Posts a comment, or a reply when `parent` is set, then refreshes
    pub async fn reply<B>(
        &mut self,
        backend: &mut B,
        content: String,
        parent: Option<CommentId>,
    ) -> anyhow::Result<Comment>
    where
        B: ?Sized + Backend,
    {
        let new = NewComment::new(self.post.id.clone(), content, parent);
        new.validate()?;
        let created = backend
            .create_comment(new)
            .await
            .with_context(|| format!("commenting on post {}", self.post.id.0))?;
        self.refresh(backend).await?;
        Ok(created)
    }

    pub async fn delete_comment<B>(&mut self, backend: &mut B, comment: &CommentId) -> anyhow::Result<()>
    where
        B: ?Sized + Backend,
    {
        backend
            .delete_comment(comment)
            .await
            .with_context(|| format!("deleting comment {}", comment.0))?;
        self.refresh(backend).await
    }

    fn post_ref(&self) -> EntityRef {
        EntityRef::Post(self.post.id.clone())
    }

    /// Shows the vote right away, the returned call still has to be sent and
    /// its outcome passed to `settle`
    pub fn begin_vote_post(&mut self, direction: VoteDirection) -> Result<RemoteCall, SyncError> {
        let entity = self.post_ref();
        self.sync.start(entity, Mutation::Vote(direction))
    }

    pub fn begin_react_post(&mut self, reaction: ReactionType) -> Result<RemoteCall, SyncError> {
        let entity = self.post_ref();
        self.sync.start(entity, Mutation::React(reaction))
    }

    pub fn begin_vote_comment(
        &mut self,
        comment: &CommentId,
        direction: VoteDirection,
    ) -> Result<RemoteCall, SyncError> {
        self.sync
            .start(EntityRef::Comment(comment.clone()), Mutation::Vote(direction))
    }

    pub fn begin_react_comment(
        &mut self,
        comment: &CommentId,
        reaction: ReactionType,
    ) -> Result<RemoteCall, SyncError> {
        self.sync
            .start(EntityRef::Comment(comment.clone()), Mutation::React(reaction))
    }

    /// Commits or rolls back a call started with `begin_*`, in any order
    pub fn settle(
        &mut self,
        call: MutationId,
        outcome: anyhow::Result<()>,
    ) -> Result<Engagement, SyncError> {
        self.sync.resolve(call, outcome)
    }

    async fn run<B>(&mut self, backend: &mut B, call: RemoteCall) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let outcome = call.send(backend).await;
        self.settle(call.id, outcome)
    }

    pub async fn vote_post<B>(
        &mut self,
        backend: &mut B,
        direction: VoteDirection,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_vote_post(direction)?;
        self.run(backend, call).await
    }

    pub async fn react_post<B>(
        &mut self,
        backend: &mut B,
        reaction: ReactionType,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_react_post(reaction)?;
        self.run(backend, call).await
    }

    pub async fn vote_comment<B>(
        &mut self,
        backend: &mut B,
        comment: &CommentId,
        direction: VoteDirection,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_vote_comment(comment, direction)?;
        self.run(backend, call).await
    }

    pub async fn react_comment<B>(
        &mut self,
        backend: &mut B,
        comment: &CommentId,
        reaction: ReactionType,
    ) -> Result<Engagement, SyncError>
    where
        B: ?Sized + Backend,
    {
        let call = self.begin_react_comment(comment, reaction)?;
        self.run(backend, call).await
    }
}
