use thiserror::Error;

use crate::domain::poll::PollId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("missing command: specify one of create, cast, results, close, delete")]
    MissingCommand,
    #[error("{0}")]
    InvalidArguments(String),
    #[error("option `{option}` is not part of poll {poll_id}")]
    OptionNotFound { poll_id: PollId, option: String },
    #[error("only the creator of poll {poll_id} may {action} it")]
    Forbidden { poll_id: PollId, action: &'static str },
    #[error("poll {0} is closed")]
    PollClosed(PollId),
    #[error("poll {poll_id} has inconsistent data: {detail}")]
    DataCorruption { poll_id: PollId, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("poll {0} not found")]
    NotFound(PollId),
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    /// A write was dispatched but never acknowledged, so it may have been applied.
    #[error("storage write outcome unknown: {0}")]
    OutcomeUnknown(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("outcome unknown: {message}")]
    Indeterminate { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Single-line text returned to the chat client.
    ///
    /// User-correctable failures echo their message; storage and internal
    /// failures use a fixed text so backend details stay in the logs.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Forbidden { message, .. }
            | Self::Conflict { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The poll service is temporarily unavailable. Please retry the command."
            }
            Self::Indeterminate { .. } => {
                "The poll service did not confirm the change. Check the poll results before retrying."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Indeterminate { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Transient failures are safe to retry as a whole request. An
    /// indeterminate write is not: it may already have been applied.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Indeterminate { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(
                error @ (DomainError::MissingCommand
                | DomainError::InvalidArguments(_)
                | DomainError::OptionNotFound { .. }),
            ) => Self::BadRequest { message: error.to_string(), correlation_id },
            ApplicationError::Domain(error @ DomainError::Forbidden { .. }) => {
                Self::Forbidden { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::PollClosed(_)) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::DataCorruption { .. }) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::NotFound(_) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Transient(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Persistence(message) => Self::Internal { message, correlation_id },
            ApplicationError::OutcomeUnknown(message) => {
                Self::Indeterminate { message, correlation_id }
            }
        }
    }
}
