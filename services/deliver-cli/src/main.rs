//! deliver - command-line client for a DeliVer deployment
//!
//! Wires the request pipeline once per invocation:
//! 1. Load config (file, then env overrides)
//! 2. Open the credential store
//! 3. Build coordinator, executor, pipeline and session around one HTTP client
//! 4. Run the subcommand

mod cli;
mod commands;
mod config;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deliver_api::{RefreshCoordinator, RequestExecutor, RequestPipeline, Session};
use deliver_auth::CredentialStore;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(base_url = %config.api.base_url, "config loaded");

    let session = build_session(&config).await?;
    let result = commands::run(cli.command, &session).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }
    result
}

/// Filter from LOG_LEVEL, then RUST_LOG, then the `-v` count.
fn init_logging(verbosity: u8, json: bool) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn build_session(config: &Config) -> Result<Session> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .context("failed to build HTTP client")?;

    let store = Arc::new(CredentialStore::open(config.credentials.path.clone()).await);
    debug!(path = %config.credentials.path.display(), "credential store opened");

    let coordinator = RefreshCoordinator::new(
        store,
        client.clone(),
        config.api.base_url.clone(),
        config.expiry_skew(),
    );
    let executor = RequestExecutor::new(client, config.api.base_url.clone());
    Ok(Session::new(RequestPipeline::new(coordinator, executor)))
}
