//! TradePilot proxy - serves the dashboard's pass-through API routes.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tradepilot_proxy::{create_router, ProxyConfig, ProxyState};

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "tradepilot-proxy.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = ProxyConfig::load()?;
    let _guard = init_tracing(config.log_dir.as_deref());

    info!(
        bind_address = %config.bind_address,
        upstream = %config.upstream_url,
        prefix = %config.normalized_prefix(),
        "TradePilot proxy starting"
    );

    let state = ProxyState::new(&config)?;
    let router = create_router(state, &config.normalized_prefix());

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Proxy server failed")?;

    info!("TradePilot proxy shutting down");
    Ok(())
}
