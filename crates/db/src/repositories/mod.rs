use thiserror::Error;

use votingbot_core::domain::poll::PollId;
use votingbot_core::store::StoreError;

pub mod poll;

pub use poll::SqlPollStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error for poll {poll_id}: {detail}")]
    Decode { poll_id: String, detail: String },
}

impl RepositoryError {
    fn decode(poll_id: &str, detail: impl Into<String>) -> Self {
        Self::Decode { poll_id: poll_id.to_string(), detail: detail.into() }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Decode { poll_id, detail } => {
                StoreError::Decode { poll_id: PollId(poll_id), detail }
            }
            RepositoryError::Database(source) if is_unavailable(&source) => {
                StoreError::Unavailable(source.to_string())
            }
            RepositoryError::Database(source) => StoreError::Backend(source.to_string()),
        }
    }
}

/// Errors a retry from the caller could plausibly clear.
fn is_unavailable(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes.
            db.code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| matches!(code & 0xff, 5 | 6))
                .unwrap_or(false)
        }
        _ => false,
    }
}
