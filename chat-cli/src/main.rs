//! # huddle
//!
//! Command-line client for the huddle conversation sync engine.
//!
//! ## Commands
//!
//! - `init`: Write a starter config file
//! - `watch`: Follow a project's conversation interactively
//! - `history`: Print a conversation snapshot
//! - `members`: List or edit group members
//! - `ensure-group`: Resolve or create a project's group
//!
//! ## Example
//!
//! ```bash
//! # Configure the local user
//! huddle init --user alice
//!
//! # Follow project p1's group chat; type to send, /quit to leave
//! HUDDLE_TOKEN=... huddle watch --project p1
//!
//! # Or a private conversation
//! huddle watch --project p1 --peer bob
//!
//! # One-shot commands
//! huddle history --group g1
//! huddle members add --group g1 --user carol
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use huddle_client::ClientConfig;

mod commands;
mod config;
mod render;

use commands::{ensure_group, history, init, members, watch};

/// Command-line client for huddle.
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Local user id
        #[arg(long, short)]
        user: String,

        /// Backend base URL
        #[arg(long)]
        http_url: Option<String>,

        /// WebSocket URL of the push channel
        #[arg(long)]
        ws_url: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Follow a conversation, sending stdin lines as messages
    Watch {
        /// Project whose group to open
        #[arg(long, short)]
        project: String,

        /// Open the private conversation with this user instead
        #[arg(long)]
        peer: Option<String>,
    },

    /// Print a conversation snapshot
    History {
        /// Group id
        #[arg(long, conflicts_with = "peer", required_unless_present = "peer")]
        group: Option<String>,

        /// Peer user id for a private conversation
        #[arg(long)]
        peer: Option<String>,
    },

    /// List or edit group members
    Members {
        #[command(subcommand)]
        action: MembersAction,
    },

    /// Resolve the project's group, creating it if needed
    EnsureGroup {
        /// Project id
        #[arg(long, short)]
        project: String,

        /// Seed members (default: project owners and collaborators)
        #[arg(long = "member")]
        members: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MembersAction {
    /// Show current members
    List {
        /// Group id
        #[arg(long, short)]
        group: String,
    },
    /// Add a member
    Add {
        /// Group id
        #[arg(long, short)]
        group: String,
        /// User to add
        #[arg(long, short)]
        user: String,
    },
    /// Remove a member
    Remove {
        /// Group id
        #[arg(long, short)]
        group: String,
        /// User to remove
        #[arg(long, short)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the timeline.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("huddle=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config;
    match cli.command {
        Commands::Init {
            user,
            http_url,
            ws_url,
            force,
        } => {
            let path = match config_path {
                Some(path) => path,
                None => config::default_path()?,
            };
            init::run(&path, &user, http_url, ws_url, force)?;
        }
        Commands::Watch { project, peer } => {
            let config = load_config(config_path.as_deref())?;
            watch::run(&config, project.into(), peer.map(Into::into)).await?;
        }
        Commands::History { group, peer } => {
            let config = load_config(config_path.as_deref())?;
            history::run(&config, group.map(Into::into), peer.map(Into::into)).await?;
        }
        Commands::Members { action } => {
            let config = load_config(config_path.as_deref())?;
            match action {
                MembersAction::List { group } => members::list(&config, group.into()).await?,
                MembersAction::Add { group, user } => {
                    members::add(&config, group.into(), user.into()).await?
                }
                MembersAction::Remove { group, user } => {
                    members::remove(&config, group.into(), user.into()).await?
                }
            }
        }
        Commands::EnsureGroup { project, members } => {
            let config = load_config(config_path.as_deref())?;
            let members = members.into_iter().map(Into::into).collect();
            ensure_group::run(&config, project.into(), members).await?;
        }
    }

    Ok(())
}

/// Load the config and check that a local user is set.
fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = config::load(path)?;
    config::require_identity(&config)?;
    Ok(config)
}
