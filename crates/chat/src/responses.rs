use serde::{Deserialize, Serialize};

use votingbot_core::domain::poll::{PollId, VoteResult};

pub const USAGE: &str = "Usage: create <question?> <option 1>, <option 2>[, ...] | \
cast <poll id> <option> | results <poll id> | close <poll id> | delete <poll id>";

/// Who sees the reply: the whole channel or only the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response_type: ResponseType,
    pub text: String,
}

impl ChatResponse {
    pub fn in_channel(text: impl Into<String>) -> Self {
        Self { response_type: ResponseType::InChannel, text: text.into() }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { response_type: ResponseType::Ephemeral, text: text.into() }
    }
}

pub fn poll_created(poll_id: &PollId, options: &[String]) -> ChatResponse {
    ChatResponse::in_channel(format!(
        "Poll created! ID: {poll_id}, Options: {}",
        options.join(", ")
    ))
}

pub fn vote_cast(user_id: &str, option: &str, poll_id: &PollId) -> ChatResponse {
    ChatResponse::in_channel(format!("{user_id} voted for {option} in poll {poll_id}"))
}

pub fn poll_results(poll_id: &PollId, rows: &[VoteResult]) -> ChatResponse {
    let Some(first) = rows.first() else {
        return ChatResponse::in_channel(format!("Poll results {poll_id}: no data"));
    };

    let mut text = format!("Poll results {poll_id}, {}:", first.question);
    for row in rows {
        text.push('\n');
        text.push_str(&format!("{}: {} votes", row.option, row.count));
    }
    ChatResponse::in_channel(text)
}

pub fn poll_closed(poll_id: &PollId) -> ChatResponse {
    ChatResponse::in_channel(format!("Poll {poll_id} closed"))
}

pub fn poll_deleted(poll_id: &PollId) -> ChatResponse {
    ChatResponse::in_channel(format!("Poll {poll_id} deleted"))
}

pub fn unknown_command() -> ChatResponse {
    ChatResponse::ephemeral(format!("Unknown command. {USAGE}"))
}
