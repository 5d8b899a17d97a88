mod bootstrap;
mod health;
mod webhook;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use votingbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use votingbot_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = app.config.listen_address();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("binding {address}"))?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "votingbot-server listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let router = app.router();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            app.db_pool.close().await;
            finished??;
            anyhow::bail!("server stopped before a shutdown signal was received");
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown requested, draining in-flight requests"
    );
    let _ = stop_tx.send(true);

    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined??,
        Err(_) => {
            server.abort();
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                "in-flight requests did not finish within the grace period"
            );
        }
    }

    app.db_pool.close().await;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "database pool closed"
    );

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
