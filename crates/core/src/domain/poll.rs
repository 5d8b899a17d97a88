use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Fewest options a poll may be created with.
pub const MIN_OPTIONS: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollId(pub String);

impl PollId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Active,
    Closed,
}

impl PollStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A question with an ordered option list and a parallel list of vote counts.
///
/// `votes[i]` is the count for `options[i]`. Records read back from storage
/// may carry a shorter `votes` list; [`Poll::tally`] zero-pads it, while a
/// longer list is reported as corruption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub creator_id: String,
    pub votes: Vec<u64>,
    pub status: PollStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// One `(option, count)` row of a results query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    pub question: String,
    pub option: String,
    pub count: u64,
}

impl Poll {
    pub fn new<I, S>(
        question: impl Into<String>,
        options: I,
        creator_id: impl Into<String>,
    ) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let question = question.into().trim().to_owned();
        if question.is_empty() {
            return Err(DomainError::InvalidArguments("a poll needs a question".to_owned()));
        }

        let options = normalize_options(options);
        if options.len() < MIN_OPTIONS {
            return Err(DomainError::InvalidArguments(format!(
                "a poll needs at least {MIN_OPTIONS} non-empty options, got {}",
                options.len()
            )));
        }

        Ok(Self {
            id: PollId::generate(),
            question,
            votes: vec![0; options.len()],
            options,
            creator_id: creator_id.into(),
            status: PollStatus::Active,
            version: 1,
            created_at: Utc::now(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.status == PollStatus::Closed
    }

    /// Vote counts aligned with `options`.
    pub fn tally(&self) -> Result<Vec<u64>, DomainError> {
        if self.votes.len() > self.options.len() {
            return Err(DomainError::DataCorruption {
                poll_id: self.id.clone(),
                detail: format!(
                    "{} options but {} vote counts",
                    self.options.len(),
                    self.votes.len()
                ),
            });
        }

        let mut tally = self.votes.clone();
        tally.resize(self.options.len(), 0);
        Ok(tally)
    }

    /// First position whose text equals `option` exactly.
    pub fn option_position(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|candidate| candidate == option)
    }

    /// Position a vote for `option` lands on.
    ///
    /// Fails when the poll is closed, when its stored counts are corrupt, or
    /// when no option matches exactly.
    pub fn vote_position(&self, option: &str) -> Result<usize, DomainError> {
        if self.is_closed() {
            return Err(DomainError::PollClosed(self.id.clone()));
        }

        self.tally()?;
        self.option_position(option).ok_or_else(|| DomainError::OptionNotFound {
            poll_id: self.id.clone(),
            option: option.to_owned(),
        })
    }

    /// Whether the stored vote list is shorter than the option list.
    pub fn needs_padding(&self) -> bool {
        self.votes.len() < self.options.len()
    }

    pub fn ensure_creator(&self, user_id: &str, action: &'static str) -> Result<(), DomainError> {
        if self.creator_id == user_id {
            return Ok(());
        }

        Err(DomainError::Forbidden { poll_id: self.id.clone(), action })
    }

    pub fn close(&mut self, user_id: &str) -> Result<(), DomainError> {
        self.ensure_creator(user_id, "close")?;
        self.status = PollStatus::Closed;
        Ok(())
    }

    pub fn results(&self) -> Result<Vec<VoteResult>, DomainError> {
        let tally = self.tally()?;
        Ok(self
            .options
            .iter()
            .zip(tally)
            .map(|(option, count)| VoteResult {
                question: self.question.clone(),
                option: option.clone(),
                count,
            })
            .collect())
    }
}

/// Trims each option and drops the empty ones, keeping order and duplicates.
pub fn normalize_options<I, S>(options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    options
        .into_iter()
        .map(|option| option.as_ref().trim().to_owned())
        .filter(|option| !option.is_empty())
        .collect()
}
