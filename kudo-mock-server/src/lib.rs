use std::{
    collections::{btree_map, BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use kudo_api::{
    Author, AuthorRef, AuthToken, Backend, Comment, CommentId, Error, NewComment, NewPost, Page,
    Post, PostId, ReactionType, Time, UserId, Visibility, VoteDirection, DEFAULT_COMMENTS_LIMIT,
    DEFAULT_FEED_LIMIT,
};
use tokio::sync::Mutex;

/// In-memory stand-in for the social backend
///
/// Time only moves forward by one second on every write, so that ordering by
/// creation date is deterministic.
pub struct MockServer {
    users: BTreeMap<UserId, Author>,
    sessions: HashMap<AuthToken, UserId>,
    /// In creation order
    posts: Vec<Post>,
    /// In creation order
    comments: Vec<Comment>,
    clock: Time,
    next_id: u64,
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            posts: Vec::new(),
            comments: Vec::new(),
            clock: kudo_api::stub_time(),
            next_id: 1,
        }
    }

    // Looks like a mongodb ObjectId
    fn gen_id(&mut self) -> String {
        let res = format!("{:024x}", self.next_id);
        self.next_id += 1;
        res
    }

    fn tick(&mut self) -> Time {
        self.clock = self.clock + chrono::Duration::seconds(1);
        self.clock
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    /// Return the post as stored, bypassing visibility rules
    pub fn test_get_post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == *id)
    }

    /// Return the comment as stored
    pub fn test_get_comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == *id)
    }

    pub fn admin_create_user(
        &mut self,
        username: &str,
        name: Option<&str>,
    ) -> Result<UserId, Error> {
        kudo_api::validate_string(username)?;
        if let Some(n) = name {
            kudo_api::validate_string(n)?;
        }
        if self
            .users
            .values()
            .any(|u| u.username.as_deref() == Some(username))
        {
            return Err(Error::InvalidArgument(format!(
                "username {username:?} is already taken"
            )));
        }

        let id = UserId(self.gen_id());
        match self.users.entry(id.clone()) {
            btree_map::Entry::Occupied(_) => Err(Error::Unknown(String::from("id collision"))),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Author {
                    id: id.clone(),
                    username: Some(String::from(username)),
                    name: name.map(String::from),
                    profile_picture: None,
                    email: Some(format!("{username}@example.com")),
                });
                tracing::debug!(user=?id, username, "created user");
                Ok(id)
            }
        }
    }

    /// Opens a session, the mock does not check passwords
    pub fn auth(&mut self, user: &UserId) -> Result<AuthToken, Error> {
        if !self.users.contains_key(user) {
            return Err(Error::PermissionDenied);
        }
        let tok = AuthToken(self.gen_id());
        self.sessions.insert(tok.clone(), user.clone());
        Ok(tok)
    }

    pub fn unauth(&mut self, tok: &AuthToken) -> Result<(), Error> {
        self.sessions
            .remove(tok)
            .map(|_| ())
            .ok_or(Error::PermissionDenied)
    }

    fn resolve(&self, tok: &AuthToken) -> Result<UserId, Error> {
        self.sessions.get(tok).cloned().ok_or(Error::PermissionDenied)
    }

    pub fn whoami(&self, tok: &AuthToken) -> Result<UserId, Error> {
        self.resolve(tok)
    }

    fn populate(&self, user: &AuthorRef) -> AuthorRef {
        match self.users.get(user.id()) {
            Some(a) => AuthorRef::Profile(a.clone()),
            None => user.clone(),
        }
    }

    fn post_mut(&mut self, id: &PostId) -> Result<&mut Post, Error> {
        self.posts
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| Error::NotFound(String::from("Post not found")))
    }

    fn comment_mut(&mut self, id: &CommentId) -> Result<&mut Comment, Error> {
        self.comments
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| Error::NotFound(String::from("Comment not found")))
    }

    pub fn create_post(&mut self, tok: &AuthToken, p: NewPost) -> Result<Post, Error> {
        let me = self.resolve(tok)?;
        p.validate()?;
        let post = Post {
            id: PostId(self.gen_id()),
            user: AuthorRef::Id(me),
            title: p.title_or_default(),
            content: p.content,
            images: p.images,
            visibility: p.visibility,
            reference: p.reference,
            engagement: Default::default(),
            comment_count: None,
            created_at: self.tick(),
        };
        tracing::debug!(post=?post.id, "created post");
        self.posts.push(post.clone());
        Ok(Post {
            user: self.populate(&post.user),
            ..post
        })
    }

    /// Public posts and the caller's own private posts, newest first
    pub fn get_feed(&self, tok: &AuthToken, page: Page) -> Result<Vec<Post>, Error> {
        let me = self.resolve(tok)?;
        let page = page.normalized(DEFAULT_FEED_LIMIT);
        Ok(self
            .posts
            .iter()
            .rev()
            .filter(|p| match p.visibility {
                Visibility::Public => true,
                Visibility::Private => *p.author_id() == me,
                // Not shown until there are friends to show them to
                Visibility::Friends => false,
            })
            .skip(page.offset())
            .take(page.limit as usize)
            .map(|p| {
                let comments = self.comments.iter().filter(|c| c.post_id == p.id);
                Post {
                    user: self.populate(&p.user),
                    comment_count: Some(comments.count() as u64),
                    ..p.clone()
                }
            })
            .collect())
    }

    /// Oldest first
    pub fn get_comments_by_post(
        &self,
        tok: &AuthToken,
        post: &PostId,
        page: Page,
    ) -> Result<Vec<Comment>, Error> {
        self.resolve(tok)?;
        let page = page.normalized(DEFAULT_COMMENTS_LIMIT);
        Ok(self
            .comments
            .iter()
            .filter(|c| c.post_id == *post)
            .skip(page.offset())
            .take(page.limit as usize)
            .map(|c| Comment {
                user: self.populate(&c.user),
                ..c.clone()
            })
            .collect())
    }

    pub fn create_comment(&mut self, tok: &AuthToken, c: NewComment) -> Result<Comment, Error> {
        let me = self.resolve(tok)?;
        if c.post_id.0.is_empty() {
            return Err(Error::InvalidArgument(String::from(
                "Post ID and content are required",
            )));
        }
        c.validate()?;
        let comment = Comment {
            id: CommentId(self.gen_id()),
            post_id: c.post_id,
            parent_id: c.parent_id,
            user: AuthorRef::Id(me),
            content: c.content,
            engagement: Default::default(),
            created_at: self.tick(),
        };
        tracing::debug!(comment=?comment.id, parent=?comment.parent_id, "created comment");
        self.comments.push(comment.clone());
        Ok(Comment {
            user: self.populate(&comment.user),
            ..comment
        })
    }

    /// Replies to the deleted post are left alone
    pub fn delete_post(&mut self, tok: &AuthToken, id: &PostId) -> Result<(), Error> {
        let me = self.resolve(tok)?;
        let idx = self
            .posts
            .iter()
            .position(|p| p.id == *id)
            .ok_or_else(|| Error::NotFound(String::from("Post not found")))?;
        if *self.posts[idx].author_id() != me {
            return Err(Error::PermissionDenied);
        }
        self.posts.remove(idx);
        tracing::debug!(post=?id, "deleted post");
        Ok(())
    }

    /// Replies to the deleted comment are left alone, and become orphans
    pub fn delete_comment(&mut self, tok: &AuthToken, id: &CommentId) -> Result<(), Error> {
        let me = self.resolve(tok)?;
        let idx = self
            .comments
            .iter()
            .position(|c| c.id == *id)
            .ok_or_else(|| Error::NotFound(String::from("Comment not found")))?;
        if *self.comments[idx].author_id() != me {
            return Err(Error::PermissionDenied);
        }
        self.comments.remove(idx);
        tracing::debug!(comment=?id, "deleted comment");
        Ok(())
    }

    pub fn vote_post(
        &mut self,
        tok: &AuthToken,
        id: &PostId,
        direction: VoteDirection,
    ) -> Result<Post, Error> {
        let me = self.resolve(tok)?;
        let p = self.post_mut(id)?;
        p.engagement.votes = p.engagement.votes.apply_vote(&me, direction);
        Ok(p.clone())
    }

    pub fn react_post(
        &mut self,
        tok: &AuthToken,
        id: &PostId,
        reaction: ReactionType,
    ) -> Result<Post, Error> {
        let me = self.resolve(tok)?;
        let p = self.post_mut(id)?;
        p.engagement.reactions = p.engagement.reactions.apply_reaction(&me, reaction);
        Ok(p.clone())
    }

    pub fn vote_comment(
        &mut self,
        tok: &AuthToken,
        id: &CommentId,
        direction: VoteDirection,
    ) -> Result<Comment, Error> {
        let me = self.resolve(tok)?;
        let c = self.comment_mut(id)?;
        c.engagement.votes = c.engagement.votes.apply_vote(&me, direction);
        Ok(c.clone())
    }

    pub fn react_comment(
        &mut self,
        tok: &AuthToken,
        id: &CommentId,
        reaction: ReactionType,
    ) -> Result<Comment, Error> {
        let me = self.resolve(tok)?;
        let c = self.comment_mut(id)?;
        c.engagement.reactions = c.engagement.reactions.apply_reaction(&me, reaction);
        Ok(c.clone())
    }
}

/// One user's connection to a shared `MockServer`
#[derive(Clone)]
pub struct MockBackend {
    server: Arc<Mutex<MockServer>>,
    token: AuthToken,
    failures_left: usize,
}

impl MockBackend {
    pub fn new(server: Arc<Mutex<MockServer>>, token: AuthToken) -> MockBackend {
        MockBackend {
            server,
            token,
            failures_left: 0,
        }
    }

    pub fn server(&self) -> &Arc<Mutex<MockServer>> {
        &self.server
    }

    /// Makes the next `n` calls fail as if the network was down, without them
    /// reaching the server
    pub fn fail_next(&mut self, n: usize) {
        self.failures_left = n;
    }

    fn network(&mut self, what: &str) -> anyhow::Result<()> {
        if self.failures_left == 0 {
            return Ok(());
        }
        self.failures_left -= 1;
        tracing::trace!(what, left = self.failures_left, "injecting failure");
        Err(anyhow!("simulated network failure"))
            .with_context(|| format!("sending {what} request"))
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_feed(&mut self, page: Page) -> anyhow::Result<Vec<Post>> {
        self.network("get_feed")?;
        Ok(self.server.lock().await.get_feed(&self.token, page)?)
    }

    async fn get_comments_by_post(
        &mut self,
        post: &PostId,
        page: Page,
    ) -> anyhow::Result<Vec<Comment>> {
        self.network("get_comments_by_post")?;
        Ok(self
            .server
            .lock()
            .await
            .get_comments_by_post(&self.token, post, page)?)
    }

    async fn create_comment(&mut self, comment: NewComment) -> anyhow::Result<Comment> {
        self.network("create_comment")?;
        Ok(self
            .server
            .lock()
            .await
            .create_comment(&self.token, comment)?)
    }

    async fn delete_post(&mut self, post: &PostId) -> anyhow::Result<()> {
        self.network("delete_post")?;
        Ok(self.server.lock().await.delete_post(&self.token, post)?)
    }

    async fn delete_comment(&mut self, comment: &CommentId) -> anyhow::Result<()> {
        self.network("delete_comment")?;
        Ok(self
            .server
            .lock()
            .await
            .delete_comment(&self.token, comment)?)
    }

    async fn vote_post(
        &mut self,
        post: &PostId,
        direction: VoteDirection,
    ) -> anyhow::Result<Post> {
        self.network("vote_post")?;
        Ok(self
            .server
            .lock()
            .await
            .vote_post(&self.token, post, direction)?)
    }

    async fn like_post(&mut self, post: &PostId, reaction: ReactionType) -> anyhow::Result<Post> {
        self.network("like_post")?;
        Ok(self
            .server
            .lock()
            .await
            .react_post(&self.token, post, reaction)?)
    }

    async fn vote_comment(
        &mut self,
        comment: &CommentId,
        direction: VoteDirection,
    ) -> anyhow::Result<Comment> {
        self.network("vote_comment")?;
        Ok(self
            .server
            .lock()
            .await
            .vote_comment(&self.token, comment, direction)?)
    }

    async fn react_comment(
        &mut self,
        comment: &CommentId,
        reaction: ReactionType,
    ) -> anyhow::Result<Comment> {
        self.network("react_comment")?;
        Ok(self
            .server
            .lock()
            .await
            .react_comment(&self.token, comment, reaction)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MockServer, AuthToken, AuthToken) {
        let mut s = MockServer::new();
        let alice = s.admin_create_user("alice", Some("Alice")).unwrap();
        let bob = s.admin_create_user("bob", None).unwrap();
        let ta = s.auth(&alice).unwrap();
        let tb = s.auth(&bob).unwrap();
        (s, ta, tb)
    }

    fn new_post(content: &str, visibility: Visibility) -> NewPost {
        NewPost {
            visibility,
            ..NewPost::new(String::from(content))
        }
    }

    #[test]
    fn ids_look_like_object_ids() {
        let (s, ta, _) = setup();
        let me = s.whoami(&ta).unwrap();
        assert_eq!(me.0.len(), 24);
        assert!(me.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(s.test_num_users(), 2);
    }

    #[test]
    fn usernames_are_unique_and_sessions_checked() {
        let (mut s, ta, _) = setup();
        assert!(matches!(
            s.admin_create_user("alice", None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            s.auth(&UserId::from("nobody")),
            Err(Error::PermissionDenied)
        );
        s.unauth(&ta).unwrap();
        assert_eq!(s.whoami(&ta), Err(Error::PermissionDenied));
        assert_eq!(
            s.get_feed(&ta, Page::feed()).map(|f| f.len()),
            Err(Error::PermissionDenied)
        );
    }

    #[test]
    fn feed_visibility_and_order() {
        let (mut s, ta, tb) = setup();
        let p1 = s.create_post(&ta, new_post("one", Visibility::Public)).unwrap();
        let p2 = s.create_post(&ta, new_post("two", Visibility::Private)).unwrap();
        let p3 = s.create_post(&ta, new_post("three", Visibility::Friends)).unwrap();
        let p4 = s.create_post(&tb, new_post("four", Visibility::Public)).unwrap();
        assert_eq!(p1.title, "Untitled");
        assert_eq!(p1.user.display_name(), Some("Alice"));
        assert!(p1.created_at < p2.created_at);

        let ids = |f: Vec<Post>| f.into_iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(
            ids(s.get_feed(&ta, Page::feed()).unwrap()),
            vec![p4.id.clone(), p2.id.clone(), p1.id.clone()]
        );
        assert_eq!(
            ids(s.get_feed(&tb, Page::feed()).unwrap()),
            vec![p4.id.clone(), p1.id.clone()]
        );
        assert!(s.test_get_post(&p3.id).is_some());

        assert_eq!(
            ids(s.get_feed(&ta, Page::new(2, 2)).unwrap()),
            vec![p1.id.clone()]
        );
        assert!(s.get_feed(&ta, Page::new(3, 2)).unwrap().is_empty());
    }

    #[test]
    fn create_post_validation() {
        let (mut s, ta, _) = setup();
        assert!(matches!(
            s.create_post(&ta, NewPost::new(String::new())),
            Err(Error::InvalidArgument(_))
        ));
        let mut p = NewPost::new(String::from("pics"));
        p.images = vec![String::from("x.jpg"); 11];
        assert!(matches!(
            s.create_post(&ta, p),
            Err(Error::InvalidArgument(_))
        ));
        let titled = NewPost {
            title: Some(String::from("Leg day")),
            ..NewPost::new(String::from("ouch"))
        };
        assert_eq!(s.create_post(&ta, titled).unwrap().title, "Leg day");
    }

    #[test]
    fn comments_are_oldest_first_and_counted() {
        let (mut s, ta, tb) = setup();
        let p = s.create_post(&ta, new_post("hi", Visibility::Public)).unwrap();
        let c1 = s
            .create_comment(&tb, NewComment::new(p.id.clone(), String::from("first"), None))
            .unwrap();
        let c2 = s
            .create_comment(
                &ta,
                NewComment::new(p.id.clone(), String::from("reply"), Some(c1.id.clone())),
            )
            .unwrap();
        assert_eq!(c1.user.display_name(), Some("bob"));
        assert!(matches!(
            s.create_comment(&ta, NewComment::new(p.id.clone(), String::from("  "), None)),
            Err(Error::InvalidArgument(_))
        ));

        let list = s.get_comments_by_post(&ta, &p.id, Page::comments()).unwrap();
        assert_eq!(
            list.iter().map(|c| &c.id).collect::<Vec<_>>(),
            vec![&c1.id, &c2.id]
        );
        assert_eq!(list[1].parent_id, Some(c1.id.clone()));
        assert_eq!(
            s.get_feed(&tb, Page::feed()).unwrap()[0].comment_count,
            Some(2)
        );
    }

    #[test]
    fn votes_and_reactions_toggle_server_side() {
        let (mut s, ta, tb) = setup();
        let alice = s.whoami(&ta).unwrap();
        let p = s.create_post(&ta, new_post("hi", Visibility::Public)).unwrap();

        let after = s.vote_post(&ta, &p.id, VoteDirection::Up).unwrap();
        assert_eq!(after.score(), 1);
        assert_eq!(after.user, AuthorRef::Id(alice.clone()));
        let after = s.vote_post(&tb, &p.id, VoteDirection::Down).unwrap();
        assert_eq!(after.score(), 0);
        let after = s.vote_post(&ta, &p.id, VoteDirection::Up).unwrap();
        assert_eq!(after.score(), -1);

        let after = s.react_post(&ta, &p.id, ReactionType::Love).unwrap();
        assert_eq!(after.engagement.reactions.reaction_of(&alice), Some(ReactionType::Love));
        let after = s.react_post(&ta, &p.id, ReactionType::Love).unwrap();
        assert!(after.engagement.reactions.is_empty());

        assert_eq!(
            s.vote_post(&ta, &PostId::from("nope"), VoteDirection::Up),
            Err(Error::NotFound(String::from("Post not found")))
        );
    }

    #[test]
    fn deletes_need_ownership_and_do_not_cascade() {
        let (mut s, ta, tb) = setup();
        let p = s.create_post(&ta, new_post("hi", Visibility::Public)).unwrap();
        let c1 = s
            .create_comment(&tb, NewComment::new(p.id.clone(), String::from("a"), None))
            .unwrap();
        let c2 = s
            .create_comment(
                &ta,
                NewComment::new(p.id.clone(), String::from("b"), Some(c1.id.clone())),
            )
            .unwrap();

        assert_eq!(s.delete_comment(&ta, &c1.id), Err(Error::PermissionDenied));
        s.delete_comment(&tb, &c1.id).unwrap();
        assert!(s.test_get_comment(&c1.id).is_none());
        assert!(s.test_get_comment(&c2.id).is_some());
        assert_eq!(
            s.delete_comment(&tb, &c1.id),
            Err(Error::NotFound(String::from("Comment not found")))
        );

        assert_eq!(s.delete_post(&tb, &p.id), Err(Error::PermissionDenied));
        s.delete_post(&ta, &p.id).unwrap();
        assert!(s.get_feed(&ta, Page::feed()).unwrap().is_empty());
        assert_eq!(
            s.get_comments_by_post(&ta, &p.id, Page::comments())
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn injected_failures_do_not_reach_the_server() {
        let (mut s, ta, _) = setup();
        let p = s.create_post(&ta, new_post("hi", Visibility::Public)).unwrap();
        let server = Arc::new(Mutex::new(s));
        let mut b = MockBackend::new(server.clone(), ta);

        b.fail_next(2);
        assert!(b.vote_post(&p.id, VoteDirection::Up).await.is_err());
        assert!(b.like_post(&p.id, ReactionType::Wow).await.is_err());
        assert_eq!(
            server.lock().await.test_get_post(&p.id).map(|p| p.score()),
            Some(0)
        );
        assert_eq!(b.vote_post(&p.id, VoteDirection::Up).await.unwrap().score(), 1);
    }

    #[tokio::test]
    async fn server_errors_stay_typed() {
        let (s, ta, _) = setup();
        let mut b = MockBackend::new(Arc::new(Mutex::new(s)), ta);
        let err = b
            .vote_comment(&CommentId::from("nope"), VoteDirection::Up)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::NotFound(String::from("Comment not found")))
        );
    }
}
