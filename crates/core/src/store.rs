use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::poll::{Poll, PollId, PollStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored poll {poll_id} could not be decoded: {detail}")]
    Decode { poll_id: PollId, detail: String },
}

/// Persistence boundary for poll records.
///
/// Every mutating call is a single backend operation. Casting goes through
/// `increment_vote`, which bumps one counter in place so concurrent casts
/// never overwrite each other. `update_votes` is a compare-and-swap on the
/// record version, used to rewrite a short vote list to full length.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert(&self, poll: &Poll) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &PollId) -> Result<Option<Poll>, StoreError>;

    /// Replaces the vote counts when the stored version equals
    /// `expected_version` and the poll is still active, bumping the version.
    /// Returns `false` when no record matched.
    async fn update_votes(
        &self,
        id: &PollId,
        expected_version: u64,
        votes: &[u64],
    ) -> Result<bool, StoreError>;

    /// Adds one vote at `position` when the poll is active and its stored
    /// vote list already has an entry there. Returns `false` otherwise.
    async fn increment_vote(&self, id: &PollId, position: usize) -> Result<bool, StoreError>;

    /// Returns `false` when the poll does not exist.
    async fn update_status(&self, id: &PollId, status: PollStatus) -> Result<bool, StoreError>;

    /// Returns `false` when the poll does not exist.
    async fn delete(&self, id: &PollId) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct InMemoryPollStore {
    polls: RwLock<HashMap<String, Poll>>,
}

impl InMemoryPollStore {
    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }
}

#[async_trait]
impl PollStore for InMemoryPollStore {
    async fn insert(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut polls = self.polls.write().await;
        if polls.contains_key(poll.id.as_str()) {
            return Err(StoreError::Backend(format!("poll {} already exists", poll.id)));
        }
        polls.insert(poll.id.0.clone(), poll.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PollId) -> Result<Option<Poll>, StoreError> {
        let polls = self.polls.read().await;
        Ok(polls.get(id.as_str()).cloned())
    }

    async fn update_votes(
        &self,
        id: &PollId,
        expected_version: u64,
        votes: &[u64],
    ) -> Result<bool, StoreError> {
        let mut polls = self.polls.write().await;
        match polls.get_mut(id.as_str()) {
            Some(poll) if poll.version == expected_version && !poll.is_closed() => {
                poll.votes = votes.to_vec();
                poll.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_vote(&self, id: &PollId, position: usize) -> Result<bool, StoreError> {
        let mut polls = self.polls.write().await;
        let Some(poll) = polls.get_mut(id.as_str()) else {
            return Ok(false);
        };
        if poll.is_closed() {
            return Ok(false);
        }
        let Some(count) = poll.votes.get_mut(position) else {
            return Ok(false);
        };
        *count = count.saturating_add(1);
        poll.version += 1;
        Ok(true)
    }

    async fn update_status(&self, id: &PollId, status: PollStatus) -> Result<bool, StoreError> {
        let mut polls = self.polls.write().await;
        match polls.get_mut(id.as_str()) {
            Some(poll) => {
                poll.status = status;
                poll.version += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &PollId) -> Result<bool, StoreError> {
        let mut polls = self.polls.write().await;
        Ok(polls.remove(id.as_str()).is_some())
    }
}
