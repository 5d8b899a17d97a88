//! Poll engine: validation, ownership rules and vote tallying on top of a
//! [`PollStore`].
//!
//! Every storage round trip is bounded by [`EngineSettings::storage_timeout`].
//! A read that expires surfaces as [`ApplicationError::Transient`]; a write
//! that expires may still have been applied and surfaces as
//! [`ApplicationError::OutcomeUnknown`].
//!
//! Casting a vote validates against a freshly loaded poll and then bumps a
//! single counter in storage. A stored vote list shorter than the option
//! list is first rewritten to full length through a version check. The
//! engine reloads and tries again when either write matches nothing, up to
//! [`EngineSettings::max_cast_attempts`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::domain::poll::{Poll, PollId, VoteResult};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{PollStore, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub storage_timeout: Duration,
    pub max_cast_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { storage_timeout: Duration::from_millis(1000), max_cast_attempts: 5 }
    }
}

/// Who issued a command and under which request it is traced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationContext {
    pub user_id: String,
    pub correlation_id: String,
}

impl OperationContext {
    pub fn new(user_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), correlation_id: correlation_id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedPoll {
    pub id: PollId,
    pub options: Vec<String>,
}

#[derive(Clone)]
pub struct PollEngine {
    store: Arc<dyn PollStore>,
    audit: Arc<dyn AuditSink>,
    settings: EngineSettings,
}

impl PollEngine {
    pub fn new(
        store: Arc<dyn PollStore>,
        audit: Arc<dyn AuditSink>,
        settings: EngineSettings,
    ) -> Self {
        Self { store, audit, settings }
    }

    pub async fn create(
        &self,
        context: &OperationContext,
        question: &str,
        options: &[String],
    ) -> Result<CreatedPoll, ApplicationError> {
        let result = self.create_inner(context, question, options).await;
        let poll_id = result.as_ref().ok().map(|created| created.id.clone());
        let event = AuditEvent::new(
            poll_id,
            &context.correlation_id,
            "poll.create",
            &context.user_id,
            outcome_of(&result),
        )
        .with_metadata("question", question)
        .with_metadata("options", options.len().to_string());
        self.emit(event, &result);
        result
    }

    async fn create_inner(
        &self,
        context: &OperationContext,
        question: &str,
        options: &[String],
    ) -> Result<CreatedPoll, ApplicationError> {
        let poll = Poll::new(question, options, &context.user_id)?;
        self.write("insert", self.store.insert(&poll)).await?;
        Ok(CreatedPoll { id: poll.id, options: poll.options })
    }

    pub async fn cast(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
        option: &str,
    ) -> Result<(), ApplicationError> {
        let result = self.cast_inner(poll_id, option).await;
        let event = AuditEvent::new(
            Some(poll_id.clone()),
            &context.correlation_id,
            "poll.vote_cast",
            &context.user_id,
            outcome_of(&result),
        )
        .with_metadata("option", option);
        let event = match &result {
            Ok(attempts) => event.with_metadata("attempts", attempts.to_string()),
            Err(_) => event,
        };
        self.emit(event, &result);
        result.map(|_| ())
    }

    async fn cast_inner(&self, poll_id: &PollId, option: &str) -> Result<u32, ApplicationError> {
        let max_attempts = self.settings.max_cast_attempts.max(1);
        for attempt in 1..=max_attempts {
            let poll = self.load(poll_id).await?;
            let position = poll.vote_position(option)?;

            if poll.needs_padding() {
                let padded = poll.tally()?;
                let swapped = self
                    .write("pad_votes", self.store.update_votes(poll_id, poll.version, &padded))
                    .await?;
                if !swapped {
                    tracing::debug!(
                        event_name = "poll.votes.pad_conflict",
                        poll_id = %poll_id,
                        attempt,
                        "poll changed while padding votes, retrying"
                    );
                    continue;
                }
            }

            if self.write("increment_vote", self.store.increment_vote(poll_id, position)).await? {
                return Ok(attempt);
            }

            tracing::debug!(
                event_name = "poll.vote_cast.conflict",
                poll_id = %poll_id,
                attempt,
                "poll changed while casting, retrying"
            );
        }

        Err(ApplicationError::Transient(format!(
            "poll {poll_id} kept changing during {max_attempts} vote attempts"
        )))
    }

    pub async fn results(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<Vec<VoteResult>, ApplicationError> {
        let result = self.results_inner(poll_id).await;
        let event = AuditEvent::new(
            Some(poll_id.clone()),
            &context.correlation_id,
            "poll.results",
            &context.user_id,
            outcome_of(&result),
        );
        self.emit(event, &result);
        result
    }

    async fn results_inner(&self, poll_id: &PollId) -> Result<Vec<VoteResult>, ApplicationError> {
        let poll = self.load(poll_id).await?;
        Ok(poll.results()?)
    }

    pub async fn close(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        let result = self.close_inner(context, poll_id).await;
        let event = AuditEvent::new(
            Some(poll_id.clone()),
            &context.correlation_id,
            "poll.close",
            &context.user_id,
            outcome_of(&result),
        );
        self.emit(event, &result);
        result
    }

    async fn close_inner(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        let mut poll = self.load(poll_id).await?;
        poll.close(&context.user_id)?;

        let updated =
            self.write("update_status", self.store.update_status(poll_id, poll.status)).await?;
        if !updated {
            return Err(ApplicationError::NotFound(poll_id.clone()));
        }
        Ok(())
    }

    pub async fn delete(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        let result = self.delete_inner(context, poll_id).await;
        let event = AuditEvent::new(
            Some(poll_id.clone()),
            &context.correlation_id,
            "poll.delete",
            &context.user_id,
            outcome_of(&result),
        );
        self.emit(event, &result);
        result
    }

    async fn delete_inner(
        &self,
        context: &OperationContext,
        poll_id: &PollId,
    ) -> Result<(), ApplicationError> {
        let poll = self.load(poll_id).await?;
        poll.ensure_creator(&context.user_id, "delete")?;

        let removed = self.write("delete", self.store.delete(poll_id)).await?;
        if !removed {
            return Err(ApplicationError::NotFound(poll_id.clone()));
        }
        Ok(())
    }

    async fn load(&self, poll_id: &PollId) -> Result<Poll, ApplicationError> {
        self.read("find_by_id", self.store.find_by_id(poll_id))
            .await?
            .ok_or_else(|| ApplicationError::NotFound(poll_id.clone()))
    }

    async fn read<T, F>(&self, operation: &'static str, call: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => result.map_err(|error| store_failure(operation, error)),
            Err(_) => Err(ApplicationError::Transient(format!(
                "{operation} timed out after {}ms",
                self.settings.storage_timeout.as_millis()
            ))),
        }
    }

    /// Like [`Self::read`], except that an expired write is not reported as
    /// retryable: the backend may finish it after the caller stops waiting.
    async fn write<T, F>(&self, operation: &'static str, call: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => result.map_err(|error| store_failure(operation, error)),
            Err(_) => Err(ApplicationError::OutcomeUnknown(format!(
                "{operation} unacknowledged after {}ms",
                self.settings.storage_timeout.as_millis()
            ))),
        }
    }

    fn emit<T>(&self, event: AuditEvent, result: &Result<T, ApplicationError>) {
        let event = match result {
            Err(error) => event.with_metadata("error", error.to_string()),
            Ok(_) => event,
        };
        self.audit.emit(event);
    }
}

fn store_failure(operation: &'static str, error: StoreError) -> ApplicationError {
    match error {
        StoreError::Unavailable(message) => {
            ApplicationError::Transient(format!("{operation}: {message}"))
        }
        StoreError::Backend(message) => {
            ApplicationError::Persistence(format!("{operation}: {message}"))
        }
        StoreError::Decode { poll_id, detail } => {
            DomainError::DataCorruption { poll_id, detail }.into()
        }
    }
}

fn outcome_of<T>(result: &Result<T, ApplicationError>) -> AuditOutcome {
    match result {
        Ok(_) => AuditOutcome::Success,
        Err(ApplicationError::Domain(DomainError::DataCorruption { .. })) => AuditOutcome::Failed,
        Err(ApplicationError::Domain(_)) | Err(ApplicationError::NotFound(_)) => {
            AuditOutcome::Rejected
        }
        Err(ApplicationError::Transient(_))
        | Err(ApplicationError::Persistence(_))
        | Err(ApplicationError::OutcomeUnknown(_)) => AuditOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{EngineSettings, OperationContext, PollEngine};
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::domain::poll::{Poll, PollId, PollStatus, VoteResult};
    use crate::errors::{ApplicationError, DomainError};
    use crate::store::{InMemoryPollStore, PollStore, StoreError};

    fn engine_with(store: Arc<dyn PollStore>) -> (PollEngine, InMemoryAuditSink) {
        let audit = InMemoryAuditSink::default();
        let engine = PollEngine::new(store, Arc::new(audit.clone()), EngineSettings::default());
        (engine, audit)
    }

    fn engine() -> (PollEngine, Arc<InMemoryPollStore>, InMemoryAuditSink) {
        let store = Arc::new(InMemoryPollStore::default());
        let (engine, audit) = engine_with(store.clone());
        (engine, store, audit)
    }

    fn as_user(user_id: &str) -> OperationContext {
        OperationContext::new(user_id, format!("req-{user_id}"))
    }

    fn options(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[tokio::test]
    async fn create_stores_zeroed_counts_for_canonical_options() {
        let (engine, store, _) = engine();

        let created = engine
            .create(&as_user("user1"), "Lunch?", &options(&["Pizza ", " ", "Sushi"]))
            .await
            .expect("create");

        assert_eq!(created.options, options(&["Pizza", "Sushi"]));
        let stored = store.find_by_id(&created.id).await.expect("find").expect("stored");
        assert_eq!(stored.options.len(), stored.votes.len());
        assert!(stored.votes.iter().all(|count| *count == 0));
        assert_eq!(stored.status, PollStatus::Active);
        assert_eq!(stored.creator_id, "user1");
    }

    #[tokio::test]
    async fn create_with_one_option_fails_and_stores_nothing() {
        let (engine, store, audit) = engine();

        let error = engine
            .create(&as_user("user1"), "Lunch?", &options(&["Pizza", ""]))
            .await
            .expect_err("one option");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidArguments(_))));
        assert!(store.is_empty().await);
        assert_eq!(audit.events()[0].outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn repeated_casts_increment_by_one_each() {
        let (engine, store, _) = engine();
        let created =
            engine.create(&as_user("u1"), "Lunch?", &options(&["Pizza", "Sushi"])).await.unwrap();

        for expected in 1..=3u64 {
            engine.cast(&as_user("u2"), &created.id, "Sushi").await.expect("cast");
            let stored = store.find_by_id(&created.id).await.unwrap().unwrap();
            assert_eq!(stored.votes, vec![0, expected]);
        }
    }

    #[tokio::test]
    async fn cast_unknown_option_leaves_counts_unchanged() {
        let (engine, store, _) = engine();
        let created =
            engine.create(&as_user("u1"), "Lunch?", &options(&["Pizza", "Sushi"])).await.unwrap();
        engine.cast(&as_user("u2"), &created.id, "Pizza").await.unwrap();

        let error = engine.cast(&as_user("u2"), &created.id, "Tacos").await.expect_err("unknown");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::OptionNotFound { ref option, .. }) if option == "Tacos"
        ));
        let stored = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![1, 0]);
    }

    #[tokio::test]
    async fn cast_on_missing_poll_is_not_found() {
        let (engine, _, _) = engine();
        let missing = PollId("missing".to_owned());

        let error = engine.cast(&as_user("u1"), &missing, "Pizza").await.expect_err("missing");
        assert_eq!(error, ApplicationError::NotFound(missing));
    }

    #[tokio::test]
    async fn cast_on_closed_poll_is_rejected() {
        let (engine, store, _) = engine();
        let created =
            engine.create(&as_user("u1"), "Lunch?", &options(&["Pizza", "Sushi"])).await.unwrap();
        engine.close(&as_user("u1"), &created.id).await.expect("close");

        let error = engine.cast(&as_user("u2"), &created.id, "Pizza").await.expect_err("closed");

        assert!(matches!(error, ApplicationError::Domain(DomainError::PollClosed(_))));
        let stored = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![0, 0]);
    }

    #[tokio::test]
    async fn results_on_missing_poll_is_not_found() {
        let (engine, _, _) = engine();

        let error = engine
            .results(&as_user("u1"), &PollId("nope".to_owned()))
            .await
            .expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn results_zero_pad_short_vote_lists() {
        let (engine, store, _) = engine();
        let mut poll = Poll::new("Color?", ["Red", "Green", "Blue"], "u1").unwrap();
        poll.votes = vec![4];
        store.insert(&poll).await.unwrap();

        let counts: Vec<u64> = engine
            .results(&as_user("u1"), &poll.id)
            .await
            .expect("results")
            .into_iter()
            .map(|row| row.count)
            .collect();
        assert_eq!(counts, vec![4, 0, 0]);
    }

    #[tokio::test]
    async fn cast_reports_corruption_for_long_vote_lists() {
        let (engine, store, audit) = engine();
        let mut poll = Poll::new("Color?", ["Red", "Green"], "u1").unwrap();
        poll.votes = vec![1, 1, 1];
        store.insert(&poll).await.unwrap();

        let error = engine.cast(&as_user("u2"), &poll.id, "Red").await.expect_err("corrupt");

        assert!(matches!(error, ApplicationError::Domain(DomainError::DataCorruption { .. })));
        assert_eq!(audit.events().last().map(|event| event.outcome), Some(AuditOutcome::Failed));
    }

    async fn stored_status(store: &InMemoryPollStore, id: &PollId) -> PollStatus {
        store.find_by_id(id).await.expect("find").expect("stored").status
    }

    #[tokio::test]
    async fn lunch_scenario_end_to_end() {
        let (engine, store, _) = engine();
        let user1 = as_user("user1");
        let user2 = as_user("user2");

        let created =
            engine.create(&user1, "Lunch?", &options(&["Pizza", "Sushi"])).await.expect("create");
        assert_eq!(created.options, options(&["Pizza", "Sushi"]));

        engine.cast(&user2, &created.id, "Pizza").await.expect("cast");
        assert_eq!(
            engine.results(&user2, &created.id).await.expect("results"),
            vec![
                VoteResult { question: "Lunch?".into(), option: "Pizza".into(), count: 1 },
                VoteResult { question: "Lunch?".into(), option: "Sushi".into(), count: 0 },
            ]
        );

        let error = engine.close(&user2, &created.id).await.expect_err("not creator");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Forbidden { .. })));
        assert_eq!(stored_status(&store, &created.id).await, PollStatus::Active);

        engine.close(&user1, &created.id).await.expect("creator closes");
        assert_eq!(stored_status(&store, &created.id).await, PollStatus::Closed);

        let error = engine.delete(&user2, &created.id).await.expect_err("not creator");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Forbidden { .. })));
        assert!(store.find_by_id(&created.id).await.unwrap().is_some());

        engine.delete(&user1, &created.id).await.expect("creator deletes");
        let error = engine.results(&user1, &created.id).await.expect_err("deleted");
        assert_eq!(error, ApplicationError::NotFound(created.id));
    }

    #[tokio::test]
    async fn closing_twice_is_idempotent_for_creator() {
        let (engine, _, _) = engine();
        let created =
            engine.create(&as_user("u1"), "Q?", &options(&["a", "b"])).await.unwrap();

        engine.close(&as_user("u1"), &created.id).await.expect("first close");
        engine.close(&as_user("u1"), &created.id).await.expect("second close");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_casts_do_not_lose_increments() {
        const VOTERS: u64 = 50;

        let (engine, store, _) = engine();
        let created =
            engine.create(&as_user("u0"), "Q?", &options(&["a", "b"])).await.unwrap();

        let mut handles = Vec::new();
        for voter in 0..VOTERS {
            let engine = engine.clone();
            let poll_id = created.id.clone();
            handles.push(tokio::spawn(async move {
                let option = if voter % 5 == 0 { "b" } else { "a" };
                engine.cast(&as_user(&format!("voter-{voter}")), &poll_id, option).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("cast");
        }

        let stored = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![40, 10]);
    }

    #[tokio::test]
    async fn cast_pads_short_vote_list_before_counting() {
        let (engine, store, audit) = engine();
        let mut poll = Poll::new("Color?", ["Red", "Green", "Blue"], "u1").unwrap();
        poll.votes = vec![2];
        store.insert(&poll).await.unwrap();

        engine.cast(&as_user("u2"), &poll.id, "Blue").await.expect("cast");

        let stored = store.find_by_id(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![2, 0, 1]);
        let cast_event = audit.events().into_iter().last().expect("cast event");
        assert_eq!(cast_event.metadata.get("attempts").map(String::as_str), Some("1"));
    }

    /// Another writer pads the vote list first and counts a vote of its own.
    #[derive(Default)]
    struct ContendedStore {
        inner: InMemoryPollStore,
        interfered: AtomicBool,
    }

    #[async_trait]
    impl PollStore for ContendedStore {
        async fn insert(&self, poll: &Poll) -> Result<(), StoreError> {
            self.inner.insert(poll).await
        }

        async fn find_by_id(&self, id: &PollId) -> Result<Option<Poll>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn update_votes(
            &self,
            id: &PollId,
            expected_version: u64,
            votes: &[u64],
        ) -> Result<bool, StoreError> {
            if !self.interfered.swap(true, Ordering::SeqCst) {
                self.inner.update_votes(id, expected_version, votes).await?;
                self.inner.increment_vote(id, 1).await?;
            }
            self.inner.update_votes(id, expected_version, votes).await
        }

        async fn increment_vote(&self, id: &PollId, position: usize) -> Result<bool, StoreError> {
            self.inner.increment_vote(id, position).await
        }

        async fn update_status(
            &self,
            id: &PollId,
            status: PollStatus,
        ) -> Result<bool, StoreError> {
            self.inner.update_status(id, status).await
        }

        async fn delete(&self, id: &PollId) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn cast_retries_when_padding_loses_the_version_check() {
        let store = Arc::new(ContendedStore::default());
        let (engine, audit) = engine_with(store.clone());
        let mut poll = Poll::new("Q?", ["a", "b"], "u1").unwrap();
        poll.votes = Vec::new();
        store.insert(&poll).await.unwrap();

        engine.cast(&as_user("u2"), &poll.id, "a").await.expect("cast after retry");

        let stored = store.find_by_id(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![1, 1]);
        let cast_event = audit.events().into_iter().last().expect("cast event");
        assert_eq!(cast_event.metadata.get("attempts").map(String::as_str), Some("2"));
    }

    /// Never answers writes, and answers reads only after a minute.
    struct StalledStore;

    #[async_trait]
    impl PollStore for StalledStore {
        async fn insert(&self, _poll: &Poll) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn find_by_id(&self, _id: &PollId) -> Result<Option<Poll>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn update_votes(&self, _: &PollId, _: u64, _: &[u64]) -> Result<bool, StoreError> {
            Err(StoreError::Backend("disk I/O error".to_owned()))
        }

        async fn increment_vote(&self, _: &PollId, _: usize) -> Result<bool, StoreError> {
            Err(StoreError::Backend("disk I/O error".to_owned()))
        }

        async fn update_status(&self, _: &PollId, _: PollStatus) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn delete(&self, _: &PollId) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_timeout_surfaces_as_transient() {
        let (engine, _) = engine_with(Arc::new(StalledStore));

        let error = engine
            .results(&as_user("u1"), &PollId("p".to_owned()))
            .await
            .expect_err("timed out");
        assert!(matches!(
            error,
            ApplicationError::Transient(ref message) if message.contains("timed out")
        ));
        assert!(error.into_interface("req").is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn write_timeout_reports_unknown_outcome() {
        let (engine, _) = engine_with(Arc::new(StalledStore));

        let error = engine
            .create(&as_user("u1"), "Q?", &options(&["a", "b"]))
            .await
            .expect_err("timed out");
        assert!(matches!(
            error,
            ApplicationError::OutcomeUnknown(ref message) if message.contains("insert")
        ));
        assert!(!error.into_interface("req").is_retryable());
    }

    /// Commits the increment and then stops answering.
    #[derive(Default)]
    struct CommitThenStallStore {
        inner: InMemoryPollStore,
    }

    #[async_trait]
    impl PollStore for CommitThenStallStore {
        async fn insert(&self, poll: &Poll) -> Result<(), StoreError> {
            self.inner.insert(poll).await
        }

        async fn find_by_id(&self, id: &PollId) -> Result<Option<Poll>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn update_votes(
            &self,
            id: &PollId,
            expected_version: u64,
            votes: &[u64],
        ) -> Result<bool, StoreError> {
            self.inner.update_votes(id, expected_version, votes).await
        }

        async fn increment_vote(&self, id: &PollId, position: usize) -> Result<bool, StoreError> {
            let applied = self.inner.increment_vote(id, position).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(applied)
        }

        async fn update_status(&self, id: &PollId, status: PollStatus) -> Result<bool, StoreError> {
            self.inner.update_status(id, status).await
        }

        async fn delete(&self, id: &PollId) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn committed_but_unacknowledged_vote_is_not_reported_as_retryable() {
        let store = Arc::new(CommitThenStallStore::default());
        let (engine, audit) = engine_with(store.clone());
        let created =
            engine.create(&as_user("u1"), "Q?", &options(&["a", "b"])).await.unwrap();

        let error = engine.cast(&as_user("u2"), &created.id, "a").await.expect_err("stalled");

        assert!(matches!(error, ApplicationError::OutcomeUnknown(_)));
        let interface = error.into_interface("req-cast");
        assert!(!interface.is_retryable());
        assert!(interface.user_message().contains("Check the poll results"));

        let stored = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.votes, vec![1, 0]);
        assert_eq!(audit.events().last().map(|event| event.outcome), Some(AuditOutcome::Failed));
    }

    /// Refuses every connection.
    struct UnreachableStore;

    #[async_trait]
    impl PollStore for UnreachableStore {
        async fn insert(&self, _poll: &Poll) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn find_by_id(&self, _id: &PollId) -> Result<Option<Poll>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn update_votes(&self, _: &PollId, _: u64, _: &[u64]) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn increment_vote(&self, _: &PollId, _: usize) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn update_status(&self, _: &PollId, _: PollStatus) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn delete(&self, _: &PollId) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }
    }

    #[tokio::test]
    async fn connectivity_errors_are_transient() {
        let (engine, _) = engine_with(Arc::new(UnreachableStore));

        let error = engine
            .results(&as_user("u1"), &PollId("p".to_owned()))
            .await
            .expect_err("unavailable");
        assert!(matches!(error, ApplicationError::Transient(_)));

        let error = engine
            .create(&as_user("u1"), "Q?", &options(&["a", "b"]))
            .await
            .expect_err("unavailable");
        assert!(matches!(error, ApplicationError::Transient(_)));
    }
}
