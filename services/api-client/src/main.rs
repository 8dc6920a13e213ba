//! Hostel admin API client
//!
//! Command-line front end over `auth_refresh::RequestDispatcher`:
//! 1. Loads configuration and the persisted session
//! 2. Executes one login, logout or API request
//! 3. Renews the access credential transparently when the API answers 401
//! 4. Prints the response body to stdout

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use auth_refresh::{Connectivity, RequestDescriptor, RequestDispatcher};
use session_store::{CredentialStore, FileStorage, KeyValueStore, MemoryStorage, SessionEvent};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::HttpTransport;

use crate::cli::{Args, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr so stdout carries only response bodies.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();

    let config_path = Config::resolve_path(args.config);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        renewal_path = %config.api.renewal_path,
        session_file = ?config.session.file,
        "configuration loaded"
    );

    let dispatcher = build_dispatcher(&config).await?;
    let events = tokio::spawn(log_session_events(dispatcher.subscribe()));

    let result = run(&dispatcher, args.command).await;

    // Closing the channel lets the logger flush what it already received.
    drop(dispatcher);
    if let Err(e) = events.await {
        warn!(error = %e, "session event logger failed");
    }

    let output = result?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Wire transport, session storage and connectivity into a dispatcher.
async fn build_dispatcher(config: &Config) -> Result<RequestDispatcher> {
    let storage: Arc<dyn KeyValueStore> = match &config.session.file {
        Some(path) => Arc::new(
            FileStorage::load(path.clone())
                .await
                .with_context(|| format!("failed to open session file {}", path.display()))?,
        ),
        None => {
            warn!("no [session].file configured, session lasts for this run only");
            Arc::new(MemoryStorage::new())
        }
    };

    let transport = Arc::new(HttpTransport::new().context("failed to build HTTP client")?);
    let store = Arc::new(CredentialStore::new(storage));

    Ok(RequestDispatcher::new(
        config.settings(),
        transport,
        store,
        Connectivity::default(),
    ))
}

/// Execute one command and return what should be printed.
async fn run(dispatcher: &RequestDispatcher, command: Command) -> Result<String> {
    match command {
        Command::Login { body } => {
            let user = dispatcher.login(&body).await.context("login failed")?;
            Ok(match user {
                Some(user) => serde_json::to_string_pretty(&user)?,
                None => String::new(),
            })
        }
        Command::Logout => {
            dispatcher.logout().await.context("logout failed")?;
            Ok(String::new())
        }
        Command::Request { method, path, body } => {
            let mut descriptor = RequestDescriptor::new(method, path);
            if let Some(body) = &body {
                descriptor = descriptor.with_json(body)?;
            }
            let response = dispatcher.execute(descriptor).await?;
            Ok(response.text())
        }
    }
}

/// Log session events until every sender is gone.
async fn log_session_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Invalidated { reason }) => {
                info!(reason = reason.label(), "session ended, log in again to continue");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session event logger fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
