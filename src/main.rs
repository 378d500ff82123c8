//! # Wikiscribe CLI (`wscribe`)
//!
//! The `wscribe` binary watches a chat conversation and turns it into a
//! wiki: each message is analyzed by a local LLM and saved as (or appended
//! to) a MediaWiki page, with a SQLite ledger guaranteeing at-most-once
//! publication per message.
//!
//! ## Usage
//!
//! ```bash
//! wscribe --config ./config/wscribe.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wscribe init` | Create the SQLite ledger and run schema migrations |
//! | `wscribe backfill` | One historical pass over the conversation |
//! | `wscribe run` | Backfill, then follow live messages until interrupted |
//! | `wscribe status` | Show ledger counts and last activity |
//!
//! Secrets come from the environment: `WIKI_PASSWORD` (required) and
//! `CHAT_BRIDGE_TOKEN` (if the bridge requires auth).

mod analysis;
mod backfill;
mod chat;
mod config;
mod db;
mod error;
mod ledger;
mod listener;
mod migrate;
mod models;
mod pipeline;
mod status;
mod wiki;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Publish a chat conversation to a wiki, one page per topic.
#[derive(Parser)]
#[command(
    name = "wscribe",
    about = "Watches a chat conversation, analyzes each message with a local LLM, and publishes the results to a MediaWiki knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wscribe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ledger database.
    ///
    /// Creates the SQLite file and the messages table. This command is
    /// idempotent: running it multiple times is safe.
    Init,

    /// Run one historical pass over the conversation.
    ///
    /// Pages backward from the most recent message, publishing anything
    /// the ledger does not already record, and prints a summary. Messages
    /// that failed in a previous run are retried.
    Backfill {
        /// Stop after this many pages.
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Backfill, then follow live messages until interrupted.
    Run {
        /// Skip the historical pass and go straight to live messages.
        #[arg(long)]
        skip_backfill: bool,
    },

    /// Show ledger counts and last activity.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wikiscribe=info,wscribe=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Ledger initialized at {}", cfg.db.path.display());
        }
        Commands::Backfill { limit } => {
            backfill::run_once(cfg, limit).await?;
        }
        Commands::Run { skip_backfill } => {
            pipeline::run(cfg, skip_backfill).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
