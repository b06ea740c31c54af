use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poll_live::api::{self, UserStatus};
use poll_live::{AppState, LatestUpdates, PollsView, Settings, UserIdentity};
use tokio::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

#[derive(Parser)]
#[command(name = "poll-live", about = "Live terminal client for the poll service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the poll list and keep it updated from the push channel
    Watch,
    /// Register a user and remember it locally
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Create a poll as the remembered user
    CreatePoll {
        #[arg(long)]
        question: String,
        #[arg(long = "option", required = true)]
        options: Vec<String>,
    },
    /// Vote for an option
    Vote { poll_id: i64, option_id: i64 },
    /// Toggle a like on a poll
    Like { poll_id: i64 },
    /// Print the remembered user
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let state = AppState::new(settings)?;

    match cli.command {
        Command::Watch => watch(&state).await,
        Command::CreateUser { email, name } => create_user(&state, &email, name.as_deref()).await,
        Command::CreatePoll { question, options } => {
            let created_by = current_user(&state)?.map(|me| me.email);
            let poll = api::create_poll(&state.api, &question, &options, created_by.as_deref())
                .await
                .context("create poll")?;
            println!("Created poll #{}: {}", poll.id, poll.question);
            Ok(())
        }
        Command::Vote { poll_id, option_id } => {
            let voter = current_user(&state)?.map(|me| me.email);
            let receipt = api::cast_vote(&state.api, poll_id, option_id, voter.as_deref())
                .await
                .context("vote")?;
            println!("{} ({} votes)", receipt.message, receipt.votes_count);
            Ok(())
        }
        Command::Like { poll_id } => {
            let user = current_user(&state)?.map(|me| me.email);
            let receipt = api::toggle_like(&state.api, poll_id, user.as_deref())
                .await
                .context("like")?;
            println!("{} ({} likes)", receipt.message, receipt.likes_count);
            Ok(())
        }
        Command::Whoami => {
            match current_user(&state)? {
                Some(me) => println!("{} ({})", me.email, me.user_id),
                None => println!("No user yet, run `poll-live create-user`"),
            }
            Ok(())
        }
    }
}

async fn watch(state: &AppState) -> Result<()> {
    state.connect();
    let store = state.mount_poll_store();
    let tracker = state.mount_updates();
    let monitor = state.spawn_liveness_monitor(Duration::from_secs(60));

    let mut views = WatchStream::new(store.subscribe());
    let mut updates = WatchStream::from_changes(tracker.subscribe());

    loop {
        tokio::select! {
            Some(view) = views.next() => render(&view),
            Some(latest) = updates.next() => announce(&latest),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    monitor.abort();
    tracker.unmount();
    store.unmount();
    state.channel.disconnect();
    Ok(())
}

async fn create_user(state: &AppState, email: &str, name: Option<&str>) -> Result<()> {
    let response = api::create_user(&state.api, email, name)
        .await
        .context("create user")?;

    match (response.status, response.user_id, response.email) {
        (UserStatus::Success, Some(user_id), Some(email)) => {
            state.identity.set(&UserIdentity { user_id, email })?;
            info!("User identity saved to {}", state.identity.path().display());
            println!("{}", response.message);
        }
        (UserStatus::Success, ..) => println!("{}", response.message),
        _ => println!("Not created: {}", response.message),
    }
    Ok(())
}

fn current_user(state: &AppState) -> Result<Option<UserIdentity>> {
    state.identity.get().context("read identity")
}

fn render(view: &PollsView) {
    if view.loading {
        println!("Loading polls...");
        return;
    }
    if let Some(error) = &view.error {
        println!("{error}");
        return;
    }

    println!("--- {} polls ---", view.polls.len());
    for poll in view.polls.iter() {
        let author = poll.created_by.as_deref().unwrap_or("anonymous");
        println!(
            "#{} {} (by {}, {} likes, {} votes)",
            poll.id,
            poll.question,
            author,
            poll.likes_count,
            poll.total_votes()
        );
        for option in &poll.options {
            println!("    [{}] {}: {}", option.id, option.text, option.votes_count);
        }
    }
}

fn announce(latest: &LatestUpdates) {
    if let Some(poll) = &latest.newest_poll {
        debug!("Newest poll so far: #{} {}", poll.id, poll.question);
    }
    if let Some(vote) = &latest.latest_vote {
        debug!(
            "Latest vote: poll #{} option {} now at {}",
            vote.poll_id, vote.option_id, vote.votes_count
        );
    }
    if let Some(like) = &latest.latest_like {
        debug!("Latest like: poll #{} now at {}", like.poll_id, like.likes_count);
    }
}
