//! package-sandbox daemon — binds the HTTP API, starts the exclusive
//! worker and timeout supervisor, and runs until signalled to stop.
//! Grounded on `at-daemon::main`'s shape (config load, logging init,
//! listener bind, signal-triggered graceful shutdown) with the
//! frontend-serving and Datadog telemetry wiring dropped: this service has
//! no dashboard and no APM vendor integration in scope.

use anyhow::{Context, Result};
use tracing::info;

use sbx_core::config::Config;
use sbx_daemon::daemon;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load config")?;
    sbx_core::logging::init("sbx-daemon", &config.general.log_level);

    info!("package-sandbox daemon starting");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {bind_addr}"))?;

    let daemon = daemon::Daemon::new(config).await.context("failed to initialize daemon")?;
    let shutdown = daemon.shutdown_handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run_with_listener(listener).await?;

    Ok(())
}
