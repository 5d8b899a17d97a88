use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

use votingbot_core::domain::poll::{Poll, PollId, PollStatus};
use votingbot_core::store::{PollStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Column layout of the `poll` table.
#[derive(Debug, FromRow)]
struct PollRow {
    id: String,
    question: String,
    options_json: Json<Vec<String>>,
    creator_id: String,
    votes_json: Json<Vec<u64>>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
}

impl PollRow {
    fn into_poll(self) -> Result<Poll, RepositoryError> {
        let status = PollStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::decode(&self.id, format!("unknown status `{}`", self.status))
        })?;
        let version = u64::try_from(self.version).map_err(|_| {
            RepositoryError::decode(&self.id, format!("negative version {}", self.version))
        })?;

        Ok(Poll {
            id: PollId(self.id),
            question: self.question,
            options: self.options_json.0,
            creator_id: self.creator_id,
            votes: self.votes_json.0,
            status,
            version,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SqlPollStore {
    pool: DbPool,
}

impl SqlPollStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_row(&self, poll: &Poll) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO poll (id, question, options_json, creator_id, votes_json, status, version, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(poll.id.as_str())
        .bind(&poll.question)
        .bind(Json(&poll.options))
        .bind(&poll.creator_id)
        .bind(Json(&poll.votes))
        .bind(poll.status.as_str())
        .bind(to_i64(poll.id.as_str(), poll.version)?)
        .bind(poll.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_row(&self, id: &PollId) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, options_json, creator_id, votes_json, status, version, created_at
             FROM poll WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::ColumnDecode { index, source } => {
                RepositoryError::decode(id.as_str(), format!("column {index}: {source}"))
            }
            other => RepositoryError::Database(other),
        })?;

        row.map(PollRow::into_poll).transpose()
    }

    async fn swap_votes(
        &self,
        id: &PollId,
        expected_version: u64,
        votes: &[u64],
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE poll
             SET votes_json = ?, version = version + 1
             WHERE id = ? AND version = ? AND status = 'active'",
        )
        .bind(Json(votes))
        .bind(id.as_str())
        .bind(to_i64(id.as_str(), expected_version)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Bumps one element of `votes_json` in a single statement, so
    /// concurrent casts serialize on SQLite's write lock instead of racing.
    async fn bump_vote(&self, id: &PollId, position: usize) -> Result<bool, RepositoryError> {
        let position = i64::try_from(position).map_err(|_| {
            RepositoryError::decode(id.as_str(), format!("option position {position} exceeds i64"))
        })?;
        let result = sqlx::query(
            "UPDATE poll
             SET votes_json = json_set(
                     votes_json,
                     '$[' || ?1 || ']',
                     COALESCE(json_extract(votes_json, '$[' || ?1 || ']'), 0) + 1
                 ),
                 version = version + 1
             WHERE id = ?2 AND status = 'active' AND json_array_length(votes_json) > ?1",
        )
        .bind(position)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of stored polls; also proves the table is readable.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM poll").fetch_one(&self.pool).await?)
    }

    async fn set_status(&self, id: &PollId, status: PollStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE poll SET status = ?, version = version + 1 WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_row(&self, id: &PollId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM poll WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PollStore for SqlPollStore {
    async fn insert(&self, poll: &Poll) -> Result<(), StoreError> {
        Ok(self.insert_row(poll).await?)
    }

    async fn find_by_id(&self, id: &PollId) -> Result<Option<Poll>, StoreError> {
        Ok(self.find_row(id).await?)
    }

    async fn update_votes(
        &self,
        id: &PollId,
        expected_version: u64,
        votes: &[u64],
    ) -> Result<bool, StoreError> {
        Ok(self.swap_votes(id, expected_version, votes).await?)
    }

    async fn increment_vote(&self, id: &PollId, position: usize) -> Result<bool, StoreError> {
        Ok(self.bump_vote(id, position).await?)
    }

    async fn update_status(&self, id: &PollId, status: PollStatus) -> Result<bool, StoreError> {
        Ok(self.set_status(id, status).await?)
    }

    async fn delete(&self, id: &PollId) -> Result<bool, StoreError> {
        Ok(self.delete_row(id).await?)
    }
}

fn to_i64(poll_id: &str, version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::decode(poll_id, format!("version {version} exceeds i64")))
}
