use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use kudo_api::{
    AuthToken, Backend, Comment, CommentId, Error, Message, NewComment, Page, Post, PostId,
    ReactionType, VoteDirection,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(serde::Serialize)]
struct VoteBody {
    #[serde(rename = "voteType")]
    vote_type: VoteDirection,
}

#[derive(serde::Serialize)]
struct ReactBody {
    #[serde(rename = "reactionType")]
    reaction_type: ReactionType,
}

/// The real backend, over its REST API
pub struct HttpBackend {
    client: reqwest::Client,
    host: String,
    token: AuthToken,
}

impl HttpBackend {
    pub fn new(host: String, token: AuthToken) -> anyhow::Result<HttpBackend> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(HttpBackend {
            client,
            host: String::from(host.trim_end_matches('/')),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path)
    }

    async fn send<R>(&self, req: reqwest::RequestBuilder) -> anyhow::Result<R>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        let resp = req
            .bearer_auth(&self.token.0)
            .send()
            .await
            .context("sending request to the server")?;
        let status = resp.status();
        let body = resp.bytes().await.context("reading response body")?;
        if !status.is_success() {
            let err = Error::from_response(status, &body);
            tracing::debug!(%status, ?err, "server refused request");
            return Err(err.into());
        }
        serde_json::from_slice(&body).context("parsing response from the server")
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_feed(&mut self, page: Page) -> anyhow::Result<Vec<Post>> {
        self.send(self.client.get(self.url("posts")).query(&page))
            .await
    }

    async fn get_comments_by_post(
        &mut self,
        post: &PostId,
        page: Page,
    ) -> anyhow::Result<Vec<Comment>> {
        self.send(
            self.client
                .get(self.url(&format!("comments/{}", post.0)))
                .query(&page),
        )
        .await
    }

    async fn create_comment(&mut self, comment: NewComment) -> anyhow::Result<Comment> {
        self.send(self.client.post(self.url("comments")).json(&comment))
            .await
    }

    async fn delete_post(&mut self, post: &PostId) -> anyhow::Result<()> {
        let _: Message = self
            .send(self.client.delete(self.url(&format!("posts/{}", post.0))))
            .await?;
        Ok(())
    }

    async fn delete_comment(&mut self, comment: &CommentId) -> anyhow::Result<()> {
        let _: Message = self
            .send(
                self.client
                    .delete(self.url(&format!("comments/{}", comment.0))),
            )
            .await?;
        Ok(())
    }

    async fn vote_post(
        &mut self,
        post: &PostId,
        direction: VoteDirection,
    ) -> anyhow::Result<Post> {
        self.send(
            self.client
                .put(self.url(&format!("posts/{}/vote", post.0)))
                .json(&VoteBody {
                    vote_type: direction,
                }),
        )
        .await
    }

    async fn like_post(&mut self, post: &PostId, reaction: ReactionType) -> anyhow::Result<Post> {
        self.send(
            self.client
                .put(self.url(&format!("posts/{}/react", post.0)))
                .json(&ReactBody {
                    reaction_type: reaction,
                }),
        )
        .await
    }

    async fn vote_comment(
        &mut self,
        comment: &CommentId,
        direction: VoteDirection,
    ) -> anyhow::Result<Comment> {
        self.send(
            self.client
                .put(self.url(&format!("comments/{}/vote", comment.0)))
                .json(&VoteBody {
                    vote_type: direction,
                }),
        )
        .await
    }

    async fn react_comment(
        &mut self,
        comment: &CommentId,
        reaction: ReactionType,
    ) -> anyhow::Result<Comment> {
        self.send(
            self.client
                .put(self.url(&format!("comments/{}/react", comment.0)))
                .json(&ReactBody {
                    reaction_type: reaction,
                }),
        )
        .await
    }
}
