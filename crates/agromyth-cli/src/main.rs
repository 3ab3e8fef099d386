//! agromyth - command-line access to an Agro-MythBusters account.
//!
//! Logs in, keeps the session across runs, and manages the profile through
//! the same session lifecycle the web client uses.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agromyth_core::{
    ApiClient, Config, CredentialStorage, FileStorage, KeyringStorage, MemoryStorage,
    ProfileUpdate, SessionManager, StorageBackend,
};

#[derive(Parser, Debug)]
#[command(name = "agromyth", version, about = "Agro-MythBusters account client")]
struct Cli {
    /// API base URL (default http://localhost:8000/api)
    #[arg(long, global = true, env = "AGROMYTH_API_URL")]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(env = "AGROMYTH_EMAIL")]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Confirm the stored session with the server
    #[command(visible_alias = "whoami")]
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Create an account and log in
    Register,
    /// Update profile fields
    Profile(ProfileArgs),
    /// Change the account password
    Passwd,
    /// Renew the access token
    Refresh,
}

#[derive(Args, Debug, Default)]
struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long, value_parser = BoolishValueParser::new())]
    farmer: Option<bool>,
    #[arg(long, value_parser = BoolishValueParser::new())]
    researcher: Option<bool>,
}

impl From<ProfileArgs> for ProfileUpdate {
    fn from(args: ProfileArgs) -> Self {
        ProfileUpdate {
            first_name: args.first_name,
            last_name: args.last_name,
            phone_number: args.phone,
            bio: args.bio,
            location: args.location,
            preferred_language: args.language,
            is_farmer: args.farmer,
            is_researcher: args.researcher,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

fn open_storage(config: &Config, ephemeral: bool) -> Result<Arc<dyn CredentialStorage>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    let storage: Arc<dyn CredentialStorage> = match config.storage {
        StorageBackend::File => Arc::new(FileStorage::new(config.cache_dir()?)),
        StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
    };
    Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file before parsing so its variables feed the env-backed flags
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    let base_url = cli
        .api_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.base_url());
    debug!(%base_url, storage = ?config.storage, ephemeral = cli.ephemeral, "Config loaded");

    let api = ApiClient::with_timeout(base_url, config.request_timeout())?;
    let storage = open_storage(&config, cli.ephemeral)?;
    let session = SessionManager::new(Arc::new(api), storage);
    info!("agromyth starting");

    match cli.command {
        Command::Login { email } => commands::login(&session, &mut config, email).await,
        Command::Logout => {
            session.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Status { json } => commands::status(&session, json).await,
        Command::Register => commands::register(&session, &mut config).await,
        Command::Profile(args) => commands::profile(&session, args.into()).await,
        Command::Passwd => commands::passwd(&session).await,
        Command::Refresh => commands::refresh(&session).await,
    }
}
