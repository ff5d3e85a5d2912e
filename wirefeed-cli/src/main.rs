//! wirefeed command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Stream news, forwarding content to a chat webhook
//! WIREFEED_WALLET=~/.config/solana/id.json wirefeed stream --webhook https://chat.example.com/hook
//!
//! # Extract one article
//! wirefeed extract article https://news.example.com/story
//!
//! # Extract several products, one after another
//! wirefeed batch product https://shop.example.com/a https://shop.example.com/b
//!
//! # Configure logging level
//! RUST_LOG=debug wirefeed stream
//! ```
//!
//! See [`wirefeed_cli::config`] for every option and its environment variable.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wirefeed::InvoicePayer;
use wirefeed::config::ClientConfig;
use wirefeed_http::{BatchOutcome, ExtractionClient};
use wirefeed_stream::{SessionManager, StopHandle, WebhookForwarder};

use wirefeed_cli::config::{self, Cli, Command};
use wirefeed_cli::observer::LogObserver;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("wirefeed failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.client.into_config();
    let payer = config::payer(&config)?;
    if payer.is_none() {
        tracing::warn!("No wallet configured; paid requests will fail");
    }

    match cli.command {
        Command::Stream { webhook } => stream(&config, payer, webhook).await,
        Command::Extract { kind, url } => {
            let client = extraction_client(&config, payer)?;
            let result = client.extract(kind, &url).await?;
            print_json(&result)
        }
        Command::Batch { kind, urls } => {
            let client = extraction_client(&config, payer)?;
            let outcomes = client.batch_extract(kind, &urls).await;
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, BatchOutcome::Failure { .. }))
                .count();
            tracing::info!(total = outcomes.len(), failed, "Batch finished");
            print_json(&outcomes)
        }
    }
}

async fn stream(
    config: &ClientConfig,
    payer: Option<Arc<dyn InvoicePayer>>,
    webhook: Option<url::Url>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = SessionManager::from_config(config, payer)?;
    manager.add_observer(Arc::new(LogObserver));
    if let Some(url) = webhook {
        tracing::info!(%url, "Forwarding content to webhook");
        manager.add_observer(Arc::new(WebhookForwarder::new(url)));
    }

    let stop = manager.stop_handle();
    tokio::spawn(stop_on_signal(stop));

    manager.start().await?;
    manager.run().await?;
    for (observer, failures) in manager.observer_failures() {
        tracing::warn!(observer, failures, "Observer failures during the stream");
    }
    tracing::info!(state = ?manager.state(), "Stream ended");
    Ok(())
}

fn extraction_client(
    config: &ClientConfig,
    payer: Option<Arc<dyn InvoicePayer>>,
) -> Result<ExtractionClient, wirefeed::Error> {
    let client = ExtractionClient::from_config(config)?;
    Ok(match payer {
        Some(payer) => client.with_payer(payer),
        None => client,
    })
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn stop_on_signal(stop: StopHandle) {
    shutdown_signal().await;
    stop.stop();
}

/// Waits for Ctrl-C or SIGTERM (Unix).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
            },
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                wait_ctrl_c(ctrl_c).await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_ctrl_c(ctrl_c).await;
}

// Never resolves if the Ctrl-C handler cannot be installed.
async fn wait_ctrl_c(ctrl_c: impl Future<Output = std::io::Result<()>>) {
    match ctrl_c.await {
        Ok(()) => tracing::info!("Received Ctrl-C, shutting down..."),
        Err(err) => {
            tracing::warn!(error = %err, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
