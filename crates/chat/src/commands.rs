use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use votingbot_core::domain::poll::{PollId, VoteResult};
use votingbot_core::engine::{CreatedPoll, OperationContext, PollEngine};
use votingbot_core::errors::{ApplicationError, DomainError};

use crate::responses::{self, ChatResponse};

/// Body of an outgoing slash-command callback, form-encoded or JSON.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub request_id: String,
}

impl CommandEnvelope {
    pub fn from_payload(payload: SlashCommandPayload, request_id: impl Into<String>) -> Self {
        Self {
            command: payload.command,
            text: payload.text,
            user_id: payload.user_id,
            channel_id: payload.channel_id,
            request_id: request_id.into(),
        }
    }

    fn context(&self) -> OperationContext {
        OperationContext::new(&self.user_id, &self.request_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollCommand {
    Create { question: String, options: Vec<String> },
    Cast { poll_id: PollId, option: String },
    Results { poll_id: PollId },
    Close { poll_id: PollId },
    Delete { poll_id: PollId },
    Unknown { verb: String },
}

impl PollCommand {
    pub fn verb(&self) -> &str {
        match self {
            Self::Create { .. } => "create",
            Self::Cast { .. } => "cast",
            Self::Results { .. } => "results",
            Self::Close { .. } => "close",
            Self::Delete { .. } => "delete",
            Self::Unknown { verb } => verb,
        }
    }
}

/// Parses command text into a poll command.
///
/// The verb is matched case-insensitively. `create` accumulates words into
/// the question up to and including the first word ending in `?`; the raw
/// text after that word is split on commas into options. `cast` keeps the
/// raw remainder after the poll id as the option text, so options may
/// contain spaces.
pub fn parse_poll_command(text: &str) -> Result<PollCommand, DomainError> {
    let mut words = Words::new(text);
    let Some(verb) = words.next_word() else {
        return Err(DomainError::MissingCommand);
    };

    match verb.to_ascii_lowercase().as_str() {
        "create" => parse_create(words),
        "cast" => {
            let poll_id =
                words.next_word().ok_or_else(|| usage_error("cast <poll id> <option>"))?;
            let option = words.rest().trim_start();
            if option.is_empty() {
                return Err(usage_error("cast <poll id> <option>"));
            }
            Ok(PollCommand::Cast { poll_id: poll_id_from(poll_id), option: option.to_owned() })
        }
        "results" => Ok(PollCommand::Results { poll_id: required_poll_id(&mut words, "results")? }),
        "close" => Ok(PollCommand::Close { poll_id: required_poll_id(&mut words, "close")? }),
        "delete" => Ok(PollCommand::Delete { poll_id: required_poll_id(&mut words, "delete")? }),
        _ => Ok(PollCommand::Unknown { verb: verb.to_owned() }),
    }
}

fn parse_create(mut words: Words<'_>) -> Result<PollCommand, DomainError> {
    let mut question = Vec::new();
    loop {
        let Some(word) = words.next_word() else {
            return Err(usage_error("create <question ending in ?> <option 1>, <option 2>"));
        };
        question.push(word);
        if word.ends_with('?') {
            break;
        }
    }

    let options = words
        .rest()
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_owned)
        .collect();

    Ok(PollCommand::Create { question: question.join(" "), options })
}

fn required_poll_id(words: &mut Words<'_>, verb: &str) -> Result<PollId, DomainError> {
    words.next_word().map(poll_id_from).ok_or_else(|| usage_error(&format!("{verb} <poll id>")))
}

fn poll_id_from(raw: &str) -> PollId {
    PollId(raw.to_owned())
}

fn usage_error(usage: &str) -> DomainError {
    DomainError::InvalidArguments(format!("invalid arguments, usage: {usage}"))
}

/// Whitespace tokenizer that keeps the untouched remainder available.
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Words<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn next_word(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn rest(&self) -> &'a str {
        self.rest
    }
}

#[async_trait]
pub trait PollCommandService: Send + Sync {
    async fn create_poll(
        &self,
        context: &OperationContext,
        question: &str,
        options: &[String],
    ) -> Result<CreatedPoll, ApplicationError>;

    async fn cast_vote(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
        option: &str,
    ) -> Result<(), ApplicationError>;

    async fn poll_results(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<Vec<VoteResult>, ApplicationError>;

    async fn close_poll(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError>;

    async fn delete_poll(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError>;
}

#[async_trait]
impl PollCommandService for PollEngine {
    async fn create_poll(
        &self,
        context: &OperationContext,
        question: &str,
        options: &[String],
    ) -> Result<CreatedPoll, ApplicationError> {
        self.create(context, question, options).await
    }

    async fn cast_vote(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
        option: &str,
    ) -> Result<(), ApplicationError> {
        self.cast(context, poll_id, option).await
    }

    async fn poll_results(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<Vec<VoteResult>, ApplicationError> {
        self.results(context, poll_id).await
    }

    async fn close_poll(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        self.close(context, poll_id).await
    }

    async fn delete_poll(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        self.delete(context, poll_id).await
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: PollCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Parses, executes and formats one command. Every error is returned
    /// unformatted so the transport can pick a status code.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ChatResponse, ApplicationError> {
        let command = parse_poll_command(&envelope.text)?;
        let context = envelope.context();

        info!(
            event_name = "chat.command.received",
            correlation_id = %envelope.request_id,
            user_id = %envelope.user_id,
            channel_id = envelope.channel_id.as_deref().unwrap_or("-"),
            verb = command.verb(),
            "poll command received"
        );

        match command {
            PollCommand::Create { question, options } => {
                let created = self.service.create_poll(&context, &question, &options).await?;
                Ok(responses::poll_created(&created.id, &created.options))
            }
            PollCommand::Cast { poll_id, option } => {
                self.service.cast_vote(&context, &poll_id, &option).await?;
                Ok(responses::vote_cast(&envelope.user_id, &option, &poll_id))
            }
            PollCommand::Results { poll_id } => {
                let rows = self.service.poll_results(&context, &poll_id).await?;
                Ok(responses::poll_results(&poll_id, &rows))
            }
            PollCommand::Close { poll_id } => {
                self.service.close_poll(&context, &poll_id).await?;
                Ok(responses::poll_closed(&poll_id))
            }
            PollCommand::Delete { poll_id } => {
                self.service.delete_poll(&context, &poll_id).await?;
                Ok(responses::poll_deleted(&poll_id))
            }
            PollCommand::Unknown { .. } => Ok(responses::unknown_command()),
        }
    }
}
