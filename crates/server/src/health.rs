//! `GET /health`: the poll service is ready when storage answers, every
//! embedded migration is applied and the `poll` table can be read.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use votingbot_db::{migrations, ping, DbPool, SqlPollStore};

#[derive(Clone)]
struct ReadinessState {
    pool: DbPool,
    polls: SqlPollStore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub component: &'static str,
    pub readiness: Readiness,
    pub detail: String,
}

impl ComponentStatus {
    fn ready(component: &'static str, detail: impl Into<String>) -> Self {
        Self { component, readiness: Readiness::Ready, detail: detail.into() }
    }

    fn degraded(component: &'static str, detail: impl Into<String>) -> Self {
        Self { component, readiness: Readiness::Degraded, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub status: Readiness,
    pub version: &'static str,
    pub components: Vec<ComponentStatus>,
    pub checked_at: DateTime<Utc>,
}

pub fn router(pool: DbPool) -> Router {
    let polls = SqlPollStore::new(pool.clone());
    Router::new().route("/health", get(readiness)).with_state(ReadinessState { pool, polls })
}

async fn readiness(State(state): State<ReadinessState>) -> (StatusCode, Json<ReadinessReport>) {
    let report = inspect(&state).await;
    let status_code = match report.status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => {
            tracing::warn!(
                event_name = "system.health.degraded",
                correlation_id = "health",
                components = ?report.components,
                "readiness check degraded"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status_code, Json(report))
}

async fn inspect(state: &ReadinessState) -> ReadinessReport {
    let components = vec![
        database(&state.pool).await,
        schema(&state.pool).await,
        poll_table(&state.polls).await,
    ];
    let status = if components.iter().all(|check| check.readiness == Readiness::Ready) {
        Readiness::Ready
    } else {
        Readiness::Degraded
    };

    ReadinessReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        components,
        checked_at: Utc::now(),
    }
}

async fn database(pool: &DbPool) -> ComponentStatus {
    match ping(pool).await {
        Ok(()) => ComponentStatus::ready("database", "connection answered"),
        Err(error) => ComponentStatus::degraded("database", format!("unreachable: {error}")),
    }
}

async fn schema(pool: &DbPool) -> ComponentStatus {
    match migrations::pending_versions(pool).await {
        Ok(pending) if pending.is_empty() => ComponentStatus::ready("schema", "migrations applied"),
        Ok(pending) => {
            ComponentStatus::degraded("schema", format!("{} migration(s) pending", pending.len()))
        }
        Err(error) => {
            ComponentStatus::degraded("schema", format!("migration state unreadable: {error}"))
        }
    }
}

async fn poll_table(polls: &SqlPollStore) -> ComponentStatus {
    match polls.count().await {
        Ok(count) => ComponentStatus::ready("polls", format!("{count} poll(s) stored")),
        Err(error) => ComponentStatus::degraded("polls", format!("poll table unreadable: {error}")),
    }
}
