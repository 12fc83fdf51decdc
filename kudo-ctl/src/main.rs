use anyhow::{anyhow, Context};
use kudo_api::{
    AuthToken, AuthorRef, Backend, CommentId, Engagement, Page, Post, PostId, ReactionType,
    UserId, VoteDirection,
};
use kudo_client::{Discussion, Feed};

mod api;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    /// Id of the user the token belongs to
    #[structopt(short, long)]
    user: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List posts, newest first
    Feed {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "20")]
        limit: u32,
    },

    /// Show the comments of a post as a thread
    Comments { post: String },

    /// Vote on a post, voting twice the same way clears the vote
    VotePost {
        post: String,

        /// up or down
        direction: VoteDirection,
    },

    /// React to a post, reacting twice the same way clears the reaction
    ReactPost {
        post: String,

        /// Like, Love, Haha, Wow, Sad or Angry
        reaction: ReactionType,
    },

    VoteComment {
        post: String,
        comment: String,
        direction: VoteDirection,
    },

    ReactComment {
        post: String,
        comment: String,
        reaction: ReactionType,
    },

    /// Comment on a post, or reply to a comment
    Comment {
        post: String,
        text: String,

        #[structopt(long)]
        parent: Option<String>,
    },

    DeleteComment { post: String, comment: String },

    DeletePost { post: String },
}

fn token() -> anyhow::Result<AuthToken> {
    let tok = std::env::var("KUDO_TOKEN").context("retrieving KUDO_TOKEN environment variable")?;
    kudo_api::validate_string(&tok).context("validating KUDO_TOKEN")?;
    Ok(AuthToken(tok))
}

/// Pages through the feed until `id` shows up, there is no route to fetch one post
async fn find_post<B>(backend: &mut B, actor: &UserId, id: &PostId) -> anyhow::Result<Post>
where
    B: ?Sized + Backend,
{
    let mut feed = Feed::new(actor.clone(), 0);
    loop {
        if let Some(p) = feed.post(id) {
            return Ok(p);
        }
        if feed.load_more(backend).await?.exhausted() {
            return Err(anyhow!("post {} is not in your feed", id.0));
        }
    }
}

fn engagement_line(e: &Engagement) -> String {
    let mut res = format!(
        "{:+} ({} up, {} down)",
        e.score(),
        e.votes.upvote_count(),
        e.votes.downvote_count()
    );
    for (r, n) in e.reactions.breakdown() {
        res += &format!(" {}{}", r.emoji(), n);
    }
    res
}

fn author(p: &AuthorRef) -> String {
    match p.display_name() {
        Some(n) => String::from(n),
        None => p.id().0.clone(),
    }
}

fn print_post(p: &Post) {
    println!("{} [{}] by {} at {}", p.id.0, p.title, author(&p.user), p.created_at);
    println!("    {}", p.content);
    let comments = p
        .comment_count
        .map(|n| format!(", {n} comments"))
        .unwrap_or_default();
    println!("    {}{}", engagement_line(&p.engagement), comments);
}

async fn open_discussion(
    backend: &mut api::HttpBackend,
    actor: &UserId,
    post: &str,
) -> anyhow::Result<Discussion> {
    let post = find_post(backend, actor, &PostId::from(post)).await?;
    let mut res = Discussion::open(backend, actor.clone(), post).await?;
    // Replies and the comments to act on can be past the first page
    while !res.load_more(backend).await?.exhausted() {}
    Ok(res)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let actor = UserId(opt.user);
    let mut backend = api::HttpBackend::new(opt.host, token()?)?;

    match opt.cmd {
        Command::Feed { page, limit } => {
            for p in backend.get_feed(Page::new(page, limit)).await? {
                print_post(&p);
            }
        }
        Command::Comments { post } => {
            let d = open_discussion(&mut backend, &actor, &post).await?;
            print_post(&d.post());
            let tree = d.tree();
            for (depth, n) in tree.walk() {
                let indent = "  ".repeat(depth + 1);
                println!(
                    "{indent}{} {}: {}",
                    n.comment.id.0,
                    author(&n.comment.user),
                    n.comment.content
                );
                println!("{indent}  {}", engagement_line(&n.comment.engagement));
            }
            if !tree.dropped.is_empty() {
                println!("({} replies to missing comments hidden)", tree.dropped.len());
            }
        }
        Command::VotePost { post, direction } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            let e = d.vote_post(&mut backend, direction).await?;
            println!("{}", engagement_line(&e));
        }
        Command::ReactPost { post, reaction } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            let e = d.react_post(&mut backend, reaction).await?;
            println!("{}", engagement_line(&e));
        }
        Command::VoteComment {
            post,
            comment,
            direction,
        } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            let e = d
                .vote_comment(&mut backend, &CommentId(comment), direction)
                .await?;
            println!("{}", engagement_line(&e));
        }
        Command::ReactComment {
            post,
            comment,
            reaction,
        } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            let e = d
                .react_comment(&mut backend, &CommentId(comment), reaction)
                .await?;
            println!("{}", engagement_line(&e));
        }
        Command::Comment { post, text, parent } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            let c = d
                .reply(&mut backend, text, parent.map(CommentId))
                .await?;
            println!("{}", c.id.0);
        }
        Command::DeleteComment { post, comment } => {
            let mut d = open_discussion(&mut backend, &actor, &post).await?;
            d.delete_comment(&mut backend, &CommentId(comment)).await?;
        }
        Command::DeletePost { post } => {
            let mut feed = Feed::new(actor, 0);
            feed.delete_post(&mut backend, &PostId(post)).await?;
        }
    }

    Ok(())
}
