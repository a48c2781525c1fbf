//! `sha256-hasher` — service binary entry point.
//!
//! Startup sequence:
//! 1. Merge an optional `.env` file, then load and validate [`Config`].
//! 2. Initialise the telemetry pipeline (OTLP traces, logs, metrics + tracing).
//! 3. Build the Axum router with request metrics on the telemetry meter.
//! 4. Serve until SIGINT / SIGTERM, then flush and shut down telemetry.

mod config;
mod crypto;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let dotenv_path = config::load_dotenv();
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    let telemetry = telemetry::init(&cfg.telemetry_options())
        .context("failed to initialise telemetry")?;
    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "loaded .env file");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        service_name = %cfg.service_name,
        export_enabled = telemetry.export_enabled(),
        resource = ?telemetry.resource_attributes(),
        "sha256-hasher starting"
    );

    // -----------------------------------------------------------------------
    // 3. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(&telemetry.meter());
    let router = server::router::build(state);

    let addr = cfg.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    // -----------------------------------------------------------------------
    // 4. Shutdown
    // -----------------------------------------------------------------------
    info!("server stopped; flushing telemetry");
    telemetry.shutdown()?;
    Ok(())
}
