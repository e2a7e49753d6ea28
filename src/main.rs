//! slack-sync - terminal client for a Slack-style workspace on Supabase
//!
//! Channels, direct messages and reactions, kept current by polling.

mod api;
mod auth;
mod config;
mod models;
mod store;
mod sync;
mod tui;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::client::SupabaseClient;
use crate::config::{Config, ConfigUpdate};
use crate::models::RecordId;
use crate::store::memory::DEMO_WORKSPACE;
use crate::store::MemoryStore;

#[derive(Parser)]
#[command(name = "slack-sync")]
#[command(about = "Terminal client for a Slack-style workspace on Supabase", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with GitHub
    Login {
        /// Sign in again even if a valid session is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show session and configuration status
    Status,

    /// Show your profile
    Whoami,

    /// Set the Supabase project and client options (prints them with no flags)
    Config {
        /// Project URL, e.g. https://abcd.supabase.co
        #[arg(long)]
        url: Option<String>,

        /// Project anon (public) key
        #[arg(long)]
        anon_key: Option<String>,

        /// Seconds between polls of the open conversation
        #[arg(long)]
        poll_secs: Option<u64>,

        /// Local port for the sign-in redirect
        #[arg(long)]
        redirect_port: Option<u16>,

        /// Workspace id to list channels from
        #[arg(long)]
        workspace: Option<RecordId>,
    },

    /// List channels you have joined
    Channels,

    /// List public channels you can join
    Browse,

    /// Join a public channel
    Join {
        /// Channel name, with or without '#'
        channel: String,
    },

    /// Create a channel and join it
    CreateChannel {
        name: String,

        /// Channel description
        #[arg(short, long)]
        description: Option<String>,

        /// Make the channel private
        #[arg(long)]
        private: bool,
    },

    /// List people in the workspace
    Users,

    /// Read messages from a conversation
    Read {
        /// '#channel', channel id, or '@user'
        conversation: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// '#channel', channel id, or '@user'
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Add (or remove) a reaction on a message
    React {
        /// Message id (shown by `read`)
        message_id: String,

        emoji: String,

        #[arg(long)]
        remove: bool,
    },

    /// Print new messages in a conversation as they arrive
    Watch {
        /// '#channel', channel id, or '@user'
        conversation: String,
    },

    /// Launch the terminal user interface
    Tui,

    /// Launch the terminal user interface on offline demo data
    Demo,
}

impl Commands {
    /// Whether the command takes over the terminal screen.
    fn is_fullscreen(&self) -> bool {
        matches!(self, Commands::Tui | Commands::Demo)
    }
}

/// Install the tracing subscriber. Fullscreen commands log to a file so
/// output does not land on the alternate screen.
fn init_logging(verbose: bool, fullscreen: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let registry = tracing_subscriber::registry().with(filter);

    if fullscreen {
        let path = Config::log_path()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
    Ok(())
}

async fn run_tui() -> Result<()> {
    let config = Config::load()?;
    let client = SupabaseClient::new().await?;
    let user_name = match api::users::own_profile(&client).await {
        Ok(Some(profile)) => profile.label().to_string(),
        Ok(None) => "me".to_string(),
        Err(e) => {
            tracing::warn!("Could not load own profile: {}", e);
            "me".to_string()
        }
    };
    let workspace = client.workspace().clone();
    tui::run(Arc::new(client), workspace, user_name, config.poll_interval()).await
}

async fn run_demo() -> Result<()> {
    let poll_interval = Config::load()
        .map(|c| c.poll_interval())
        .unwrap_or(sync::DEFAULT_POLL_INTERVAL);
    let store = Arc::new(MemoryStore::demo());
    tui::run(
        store,
        RecordId::Int(DEMO_WORKSPACE),
        "You".to_string(),
        poll_interval,
    )
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.command.is_fullscreen())?;

    match cli.command {
        Commands::Login { force } => {
            tracing::info!("Starting sign-in...");
            auth::login(force).await?;
        }
        Commands::Logout => {
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Whoami => {
            api::whoami().await?;
        }
        Commands::Config {
            url,
            anon_key,
            poll_secs,
            redirect_port,
            workspace,
        } => {
            config::configure(ConfigUpdate {
                url,
                anon_key,
                poll_secs,
                redirect_port,
                workspace,
            })?;
        }
        Commands::Channels => {
            api::list_channels().await?;
        }
        Commands::Browse => {
            api::browse().await?;
        }
        Commands::Join { channel } => {
            api::join_channel(&channel).await?;
        }
        Commands::CreateChannel {
            name,
            description,
            private,
        } => {
            api::create_channel(&name, description.as_deref(), private).await?;
        }
        Commands::Users => {
            api::list_users().await?;
        }
        Commands::Read {
            conversation,
            limit,
        } => {
            api::read_messages(&conversation, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            api::send_message(&to, &message).await?;
        }
        Commands::React {
            message_id,
            emoji,
            remove,
        } => {
            api::react(&message_id, &emoji, remove).await?;
        }
        Commands::Watch { conversation } => {
            api::watch(&conversation).await?;
        }
        Commands::Tui => {
            run_tui().await?;
        }
        Commands::Demo => {
            run_demo().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_and_react() {
        let cli = Cli::try_parse_from(["slack-sync", "send", "--to", "#general", "hello"]).unwrap();
        match cli.command {
            Commands::Send { to, message } => {
                assert_eq!(to, "#general");
                assert_eq!(message, "hello");
            }
            _ => panic!("expected send"),
        }

        let cli =
            Cli::try_parse_from(["slack-sync", "react", "42", "👍", "--remove", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::React { remove: true, .. }
        ));
    }

    #[test]
    fn test_config_workspace_accepts_text_ids() {
        let cli = Cli::try_parse_from(["slack-sync", "config", "--workspace", "ws-main"]).unwrap();
        match cli.command {
            Commands::Config { workspace, .. } => {
                assert_eq!(workspace, Some(RecordId::Text("ws-main".into())));
            }
            _ => panic!("expected config"),
        }
        assert!(Cli::try_parse_from(["slack-sync", "demo"])
            .unwrap()
            .command
            .is_fullscreen());
    }
}
