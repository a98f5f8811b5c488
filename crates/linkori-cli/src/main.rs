//! Linkori CLI - terminal access to the leaderboard session.
//!
//! Restores the stored credential, verifies or silently renews it, and
//! exposes the session actions (login, logout, refresh) as subcommands.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use linkori_core::api::{HttpAuthClient, Provider};
use linkori_core::auth::{open_store, StoreBackend};
use linkori_core::config::Config;
use linkori_core::session::{SessionManager, SessionProvider};

#[derive(Debug, Parser)]
#[command(name = "linkori", version, about = "Linkori leaderboard session client")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "LINKORI_API_URL", global = true)]
    api_url: Option<String>,

    /// Where the credential is kept: keyring, file or memory
    #[arg(long, env = "LINKORI_STORE", global = true)]
    store: Option<StoreBackend>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current session
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Adopt an access token (prompted if omitted)
    Login { token: Option<String> },
    /// Exchange an OAuth callback code for a token and adopt it
    Callback { provider: Provider, code: String },
    /// Discard the stored credential
    Logout,
    /// Renew the credential through the refresh cookie
    Refresh,
    /// Show the signed-in account
    Whoami,
    /// Print the provider login URL
    LoginUrl { provider: Provider },
    /// Show the effective configuration
    Config {
        /// Write it back to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines when dropped.
fn init_tracing() -> WorkerGuard {
    // RUST_LOG controls the level (e.g., RUST_LOG=linkori_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(ref url) = cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(store) = cli.store {
        config.store = store;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing();

    let config = load_config(&cli)?;
    info!(api_url = %config.api_url, store = ?config.store, "Linkori starting");

    if let Command::Config { save } = cli.command {
        return commands::config(&config, cli.config.as_deref(), save);
    }

    let client = HttpAuthClient::from_config(&config)?;
    let store = open_store(config.store, &config.origin()?)?;
    let manager = SessionManager::with_policy(client, store, config.retry_policy());
    let provider = SessionProvider::new(manager);

    // Logout only clears the slot, so the stored credential is not verified
    // or refreshed first.
    let session = match cli.command {
        Command::Logout => provider.context(),
        _ => provider.mount().await,
    };

    match cli.command {
        Command::Status { json } => commands::status(&session, json),
        Command::Login { token } => commands::login(&session, token).await,
        Command::Callback { provider, code } => {
            commands::callback(&session, provider, &code).await
        }
        Command::Logout => {
            commands::logout(&session);
            Ok(())
        }
        Command::Refresh => commands::refresh(&session).await,
        Command::Whoami => commands::whoami(&session).await,
        Command::LoginUrl { provider } => commands::login_url(&session, provider).await,
        Command::Config { .. } => Ok(()),
    }
}
