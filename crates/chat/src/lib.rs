//! Chat-platform command surface for votingbot.
//!
//! - **Commands** (`commands`) - slash-command payloads, the poll command
//!   grammar and the router that drives the poll engine
//! - **Responses** (`responses`) - plain-text replies with visibility markers
//!
//! # Command grammar
//!
//! ```text
//! create <question ending in ?> <option 1>, <option 2>[, ...]
//! cast <poll id> <option text>
//! results <poll id>
//! close <poll id>
//! delete <poll id>
//! ```

pub mod commands;
pub mod responses;

pub use commands::{
    parse_poll_command, CommandEnvelope, CommandRouter, PollCommand, PollCommandService,
    SlashCommandPayload,
};
pub use responses::{ChatResponse, ResponseType};
