use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::poll::PollId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub poll_id: Option<PollId>,
    pub correlation_id: String,
    pub event_type: String,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        poll_id: Option<PollId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            poll_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Logging capability handed to the poll engine.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Forwards audit events to the process `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let poll_id = event.poll_id.as_ref().map(PollId::as_str).unwrap_or("unknown");
        let metadata = format!("{:?}", event.metadata);
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                poll_id,
                user_id = %event.actor,
                outcome = event.outcome.as_str(),
                metadata = %metadata,
                "poll operation applied"
            ),
            AuditOutcome::Rejected => tracing::warn!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                poll_id,
                user_id = %event.actor,
                outcome = event.outcome.as_str(),
                metadata = %metadata,
                "poll operation rejected"
            ),
            AuditOutcome::Failed => tracing::error!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                poll_id,
                user_id = %event.actor,
                outcome = event.outcome.as_str(),
                metadata = %metadata,
                "poll operation failed"
            ),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
