//! ragchat - terminal front-end for a streaming RAG chat backend
//!
//! # Usage
//!
//! ```bash
//! # Interactive chat
//! ragchat
//!
//! # One-shot question, continuing a saved chat
//! ragchat ask "What changed in the index?" --session 1700000000000
//!
//! # Manage saved chats
//! ragchat sessions list
//! ragchat sessions rename 1700000000000 "Index notes"
//!
//! # Probe the backend
//! ragchat health
//! ```
//!
//! # Environment Variables
//!
//! - `RAGCHAT_ENDPOINT`: chat endpoint URL
//! - `RAGCHAT_HEALTH_PATH`: health path on the endpoint's host
//! - `RAGCHAT_CONNECT_TIMEOUT_MS`: connect timeout
//! - `RAGCHAT_RENDER_INTERVAL_MS`: minimum spacing between renders
//! - `RAGCHAT_STORE_PATH`: session file
//! - `RUST_LOG`: log filter (logs go to stderr)
//!
//! # Files
//!
//! - Config: `$XDG_CONFIG_HOME/ragchat/client.toml`
//! - Sessions: `$XDG_DATA_HOME/ragchat/sessions.json`

mod commands;
mod repl;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ragchat_core::{
    default_config_path, load_config_from_path, ChatAppState, ConfigOverrides, FileSessionStore,
    HttpTransport, SessionId,
};

use crate::repl::ReplExit;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, env = "RAGCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat endpoint URL (overrides config and environment)
    #[arg(short = 'e', long, value_name = "URL")]
    endpoint: Option<String>,

    /// Session file (overrides config and environment)
    #[arg(short = 's', long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question and print the streamed answer
    Ask {
        /// The question
        query: String,

        /// Continue this saved chat instead of starting a new one
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Print only the final answer text
        #[arg(long)]
        raw: bool,
    },

    /// Manage saved chats
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Check whether the backend is up and its index is ready
    Health,
}

#[derive(Subcommand, Debug)]
enum SessionsAction {
    /// List saved chats, newest first
    List,
    /// Print a saved chat
    Show {
        /// Session id
        id: String,
    },
    /// Rename a saved chat
    Rename {
        /// Session id
        id: String,
        /// New title
        title: String,
    },
    /// Delete a saved chat
    Delete {
        /// Session id
        id: String,
    },
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ragchat={level}").parse()?)
                .add_directive(format!("ragchat_core={level}").parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_app(cli: &Cli) -> Result<ChatAppState> {
    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref endpoint) = cli.endpoint {
        overrides = overrides.with_endpoint(endpoint.clone());
    }
    if let Some(ref store) = cli.store {
        overrides = overrides.with_store_path(store.clone());
    }
    overrides
        .apply(&mut config)
        .context("Invalid command line override")?;

    info!(
        endpoint = %config.endpoint,
        store = %config.store_path.display(),
        source = %config.source(),
        "Configuration resolved"
    );

    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let store = Arc::new(FileSessionStore::new(config.store_path.clone()));
    let app = ChatAppState::init(config, transport, store).context("Failed to load sessions")?;
    Ok(app)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut app = build_app(&cli)?;

    let mut interrupted = false;
    let result = match cli.command {
        None => match repl::run(&mut app).await {
            Ok(exit) => {
                interrupted = exit == ReplExit::Interrupted;
                Ok(())
            }
            Err(e) => Err(e),
        },
        Some(Command::Ask {
            query,
            session,
            raw,
        }) => commands::ask(&mut app, &query, session.map(SessionId::from), raw).await,
        Some(Command::Sessions { action }) => match action {
            SessionsAction::List => {
                commands::print_session_list(&app);
                Ok(())
            }
            SessionsAction::Show { id } => commands::show_session(&mut app, &SessionId::from(id)),
            SessionsAction::Rename { id, title } => {
                commands::rename_session(&mut app, &SessionId::from(id), &title)
            }
            SessionsAction::Delete { id } => {
                commands::delete_session(&mut app, &SessionId::from(id))
            }
        },
        Some(Command::Health) => commands::health(&app).await,
    };

    app.teardown().context("Failed to save sessions")?;

    // A pending stdin read would keep the runtime alive until the next line
    if interrupted {
        std::process::exit(0);
    }
    result
}
