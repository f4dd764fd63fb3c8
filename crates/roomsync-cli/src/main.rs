//! `roomsync` keeps a local store of chat subscriptions in step with the
//! server.
//!
//! # Usage
//!
//! ```
//! roomsync import subscriptions.json
//! roomsync open-channel general
//! roomsync --config ~/.config/roomsync/roomsync.toml list
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use commands::Session;
use config::ClientConfig;
use roomsync_core::subscription::SubscriptionKind;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "roomsync", version, about = "Local store of chat subscriptions")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "roomsync.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sync subscription documents from a JSON file into the store.
  Import {
    /// A document, an array of documents, or an `{update, remove}` change set.
    file: PathBuf,
  },
  /// Print the stored subscriptions of the configured user as JSON.
  List,
  /// Open a channel by name and resolve it against the server.
  OpenChannel { name: String },
  /// Open a direct message with a user and resolve it against the server.
  OpenDm { username: String },
  /// Resolve the room of an existing subscription.
  Resolve { local_id: Uuid },
  /// Print the stored messages of a subscription, oldest first.
  Messages { local_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = ClientConfig::load(&cli.config)
    .with_context(|| format!("failed to load {:?}", cli.config))?;
  let session = Session::open(&cfg).await?;

  match cli.command {
    Command::Import { file } => session.import(&file).await,
    Command::List => session.list().await,
    Command::OpenChannel { name } => session.open_subscription(SubscriptionKind::Channel, name).await,
    Command::OpenDm { username } => {
      session.open_subscription(SubscriptionKind::DirectMessage, username).await
    }
    Command::Resolve { local_id } => session.resolve(local_id).await,
    Command::Messages { local_id } => session.messages(local_id).await,
  }
}
