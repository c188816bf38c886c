//! quizprep command-line client
//!
//! Signs in against the quizprep API, keeps the session in a local file and
//! issues authenticated requests. Expired access tokens are refreshed
//! transparently by the API client.

mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::ApiClient;
use clap::{Parser, Subcommand};
use interceptor::ApiRequest;
use serde_json::Value;
use session::{FileStore, SessionStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, resolve_password};

#[derive(Debug, Parser)]
#[command(name = "quizprep", version, about = "quizprep API client")]
struct Cli {
    /// Config file (default: QUIZPREP_CONFIG or ./quizprep.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in (password from QUIZPREP_PASSWORD or --password-file)
    Login {
        email: String,
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Sign out and erase the stored session
    Logout,
    /// Show the stored session (never the tokens)
    Whoami,
    /// Fetch the user profile
    Profile,
    /// Fetch the dashboard summary
    Dashboard,
    /// Start a mock test (premium only)
    MockStart,
    /// GET an arbitrary API path, e.g. `/practice/filters`
    Get { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let config = Config::load_or_default(&config_path, explicit)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        base_url = %config.api.base_url,
        session_path = %config.session.path.display(),
        "configuration loaded"
    );

    // Hydrate before any request so the first call carries the stored token
    let store = Arc::new(SessionStore::new(Arc::new(FileStore::new(
        config.session.path.clone(),
    ))));
    if let Err(e) = store.hydrate().await {
        warn!(error = %e, "could not read stored session, continuing signed out");
    }

    let client = ApiClient::new(config.client_config(), store.clone())
        .context("failed to build API client")?;

    match cli.command {
        Command::Login {
            email,
            password_file,
        } => {
            let password = resolve_password(password_file.as_deref())?;
            let user = client.login(&email, &password).await?;
            println!("signed in as {} ({})", user.name, user.id);
        }
        Command::Signup {
            name,
            email,
            phone,
            password_file,
        } => {
            let password = resolve_password(password_file.as_deref())?;
            let user = client.signup(&name, &email, &phone, &password).await?;
            println!("account created, signed in as {} ({})", user.name, user.id);
        }
        Command::Logout => {
            client.logout().await?;
            println!("signed out");
        }
        Command::Whoami => {
            let session = store.snapshot();
            if !session.is_authenticated() {
                return Err(error::Error::NotSignedIn.into());
            }
            print_json(&serde_json::json!({
                "user": session.user,
                "subscription": session.subscription,
            }))?;
        }
        Command::Profile => print_json(&client.profile().await?)?,
        Command::Dashboard => print_json(&client.dashboard_summary().await?)?,
        Command::MockStart => print_json(&client.start_mock().await?)?,
        Command::Get { path } => {
            let path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
            let value: Value = client.execute(ApiRequest::get(path)).await?.json()?;
            print_json(&value)?;
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
