use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::info;

use votingbot_core::audit::TracingAuditSink;
use votingbot_core::config::AppConfig;
use votingbot_core::engine::PollEngine;
use votingbot_db::{connect_with_settings, migrations, DbPool, SqlPollStore};

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: PollEngine,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let engine = PollEngine::new(
        Arc::new(SqlPollStore::new(db_pool.clone())),
        Arc::new(TracingAuditSink),
        config.engine_settings(),
    );

    Ok(Application { config, db_pool, engine })
}

impl Application {
    /// Webhook and health routes on one listener, wrapped in the CORS layer.
    pub fn router(&self) -> Router {
        webhook::router(self.engine.clone())
            .merge(health::router(self.db_pool.clone()))
            .layer(webhook::cors_layer(&self.config.server.cors_allowed_origins))
    }
}
