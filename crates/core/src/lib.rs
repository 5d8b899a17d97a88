pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::poll::{Poll, PollId, PollStatus, VoteResult};
pub use engine::{CreatedPoll, EngineSettings, OperationContext, PollEngine};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use store::{InMemoryPollStore, PollStore, StoreError};
