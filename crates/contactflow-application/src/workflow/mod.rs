//! Workflow State Machine service.
//!
//! Drives one contact through staging, validation and persistence. The
//! session lives only in the session store; every operation is
//! load → transition → save, so any instance can serve any session.
//!
//! Operations are split across submodules by step:
//! - `stage`: stage, get_staged, update_staged, retry_staging
//! - `validate`: validate, resolve_manual_review
//! - `persist`: persist, retry_validation, complete
//! - `lifecycle`: extend_session, cancel_session, fail_session

mod lifecycle;
mod persist;
mod results;
mod stage;
mod validate;

pub use results::{
    CancelResult, CompletionResult, ExtendResult, PersistResult, ReconcileResult, StageResult,
    TransitionResult, ValidationResult,
};

use crate::store_client::{SessionStoreClient, StoredSession};
use chrono::{DateTime, Utc};
use contactflow_core::collaborator::{ContactRepository, EnumLookup, UniquenessChecker};
use contactflow_core::normalize::professional;
use contactflow_core::outcome::{OutcomeKind, OutcomeLog, WorkflowOutcome};
use contactflow_core::session::{Session, SessionStore, WorkflowEvent};
use contactflow_core::{FlowError, OrchestratorConfig, Result};
use std::sync::Arc;

/// Collaborators the service is wired with.
#[derive(Clone)]
pub struct WorkflowDependencies {
    pub store: Arc<dyn SessionStore>,
    pub uniqueness: Arc<dyn UniquenessChecker>,
    pub repository: Arc<dyn ContactRepository>,
    pub enums: Arc<dyn EnumLookup>,
    pub outcomes: Arc<dyn OutcomeLog>,
}

pub struct ContactWorkflowService {
    config: OrchestratorConfig,
    sessions: SessionStoreClient,
    uniqueness: Arc<dyn UniquenessChecker>,
    repository: Arc<dyn ContactRepository>,
    enums: Arc<dyn EnumLookup>,
    outcomes: Arc<dyn OutcomeLog>,
}

impl ContactWorkflowService {
    /// Fails with `Config` if `config` is out of bounds.
    pub fn new(config: OrchestratorConfig, deps: WorkflowDependencies) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sessions: SessionStoreClient::new(deps.store, &config),
            config,
            uniqueness: deps.uniqueness,
            repository: deps.repository,
            enums: deps.enums,
            outcomes: deps.outcomes,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStoreClient {
        &self.sessions
    }

    /// Moves a session to `failed` because of `error` and records the outcome.
    ///
    /// Used by the bulk coordinator for members that did not make it. Absent
    /// and already-terminal sessions are left alone.
    pub async fn fail_for_error(&self, session_id: &str, error: &FlowError) -> Result<()> {
        let Some(mut stored) = self.sessions.load(session_id).await? else {
            return Ok(());
        };
        if stored.session.is_terminal() {
            return Ok(());
        }
        self.mark_failed(&mut stored, error.category(), error.to_string())
            .await
    }

    /// Applies `Fail`, saves, and logs the failed outcome.
    pub(crate) async fn mark_failed(
        &self,
        stored: &mut StoredSession,
        reason: &str,
        detail: String,
    ) -> Result<()> {
        let now = Utc::now();
        stored
            .session
            .apply(WorkflowEvent::Fail, Some(detail.clone()), now)?;
        self.sessions.save(stored).await?;
        tracing::info!(
            session_id = %stored.session.session_id,
            reason,
            detail = %detail,
            "Session failed"
        );
        self.record_outcome(&stored.session, OutcomeKind::Failed, Some(reason), now)
            .await;
        Ok(())
    }

    /// Fails the session for running out of retries and returns the error to report.
    pub(crate) async fn exhaust_retries(&self, mut stored: StoredSession) -> FlowError {
        let error = FlowError::RetryExhausted {
            session_id: stored.session.session_id.clone(),
            max_retries: self.config.max_retries,
        };
        match self
            .mark_failed(&mut stored, error.category(), error.to_string())
            .await
        {
            Ok(()) => error,
            Err(e) => e,
        }
    }

    /// Outcome log failures never fail the workflow.
    pub(crate) async fn record_outcome(
        &self,
        session: &Session,
        kind: OutcomeKind,
        failure_reason: Option<&str>,
        finished_at: DateTime<Utc>,
    ) {
        let outcome = build_outcome(session, kind, failure_reason, finished_at);
        if let Err(e) = self.outcomes.record(outcome).await {
            tracing::warn!(session_id = %session.session_id, error = %e, "Failed to record outcome");
        }
    }
}

fn build_outcome(
    session: &Session,
    kind: OutcomeKind,
    failure_reason: Option<&str>,
    finished_at: DateTime<Utc>,
) -> WorkflowOutcome {
    let analysis = session
        .last_validation
        .as_ref()
        .and_then(|v| v.professional.clone())
        .unwrap_or_else(|| professional::analyze(&session.payload, &session.social_profiles));
    WorkflowOutcome {
        session_id: session.session_id.clone(),
        account_id: session.account_id.clone(),
        batch_id: session.batch_id.clone(),
        kind,
        failure_reason: failure_reason.map(str::to_string),
        started_at: session.created_at,
        finished_at,
        normalized_profile_count: session.normalized_profile_count(),
        business_id_generated: session.business_id_generated,
        job_level: Some(analysis.job_level),
        department: Some(analysis.department),
        industry_category: analysis.industry_category,
        has_linkedin: analysis.has_linkedin,
        is_business_email: analysis.is_business_email,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Hand-written collaborators for the workflow unit tests.

    use super::*;
    use async_trait::async_trait;
    use contactflow_core::collaborator::{ContactRecord, CreatedContact, UniquenessCheck};
    use contactflow_core::outcome::OutcomeFilter;
    use contactflow_core::session::StoredValue;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct MockStore {
        pub data: Mutex<HashMap<String, StoredValue>>,
        /// Reject every write once set.
        pub read_only: AtomicBool,
    }

    impl MockStore {
        fn check_writable(&self) -> Result<()> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(FlowError::store("store is read-only"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for MockStore {
        async fn put(&self, key: &str, value: String, _ttl: Duration) -> Result<()> {
            self.check_writable()?;
            let mut data = self.data.lock().await;
            let revision = data.get(key).map_or(1, |v| v.revision + 1);
            data.insert(key.to_string(), StoredValue { value, revision });
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
            Ok(self.data.lock().await.get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().await.remove(key);
            Ok(())
        }

        async fn put_if_revision(
            &self,
            key: &str,
            value: String,
            _ttl: Duration,
            expected: Option<u64>,
        ) -> Result<Option<u64>> {
            self.check_writable()?;
            let mut data = self.data.lock().await;
            if data.get(key).map(|v| v.revision) != expected {
                return Ok(None);
            }
            let revision = expected.map_or(1, |r| r + 1);
            data.insert(key.to_string(), StoredValue { value, revision });
            Ok(Some(revision))
        }
    }

    /// Business ids in `taken` belong to `existing_<id>`.
    #[derive(Default)]
    pub struct MockDirectory {
        pub taken: Mutex<HashSet<String>>,
        pub fail_creates: Mutex<bool>,
        pub created: Mutex<Vec<ContactRecord>>,
        pub primaries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl UniquenessChecker for MockDirectory {
        async fn check(&self, candidate: &str) -> Result<UniquenessCheck> {
            Ok(if self.taken.lock().await.contains(candidate) {
                UniquenessCheck::taken_by(format!("existing_{}", candidate))
            } else {
                UniquenessCheck::unique()
            })
        }
    }

    #[async_trait]
    impl ContactRepository for MockDirectory {
        async fn create(&self, record: ContactRecord) -> Result<CreatedContact> {
            if *self.fail_creates.lock().await {
                return Err(FlowError::repository("database unavailable"));
            }
            let mut created = self.created.lock().await;
            created.push(record.clone());
            self.taken.lock().await.insert(record.business_id.clone());
            Ok(CreatedContact {
                contact_id: format!("contact_{}", created.len()),
                business_id: record.business_id,
            })
        }

        async fn set_primary(&self, account_id: &str, contact_id: &str) -> Result<()> {
            self.primaries
                .lock()
                .await
                .push((account_id.to_string(), contact_id.to_string()));
            Ok(())
        }
    }

    pub struct MockEnums;

    impl EnumLookup for MockEnums {
        fn is_valid(&self, category: &str, value: &str) -> bool {
            match category {
                "contact_type" => ["customer", "lead"].contains(&value),
                "industry" => ["technology", "finance"].contains(&value),
                _ => false,
            }
        }

        fn values(&self, _category: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[derive(Default)]
    pub struct MockOutcomes {
        pub recorded: Mutex<Vec<WorkflowOutcome>>,
    }

    #[async_trait]
    impl OutcomeLog for MockOutcomes {
        async fn record(&self, outcome: WorkflowOutcome) -> Result<()> {
            self.recorded.lock().await.push(outcome);
            Ok(())
        }

        async fn list(&self, filter: &OutcomeFilter) -> Result<Vec<WorkflowOutcome>> {
            Ok(self
                .recorded
                .lock()
                .await
                .iter()
                .filter(|o| filter.matches(o))
                .cloned()
                .collect())
        }
    }

    pub struct Harness {
        pub service: ContactWorkflowService,
        pub store: Arc<MockStore>,
        pub directory: Arc<MockDirectory>,
        pub outcomes: Arc<MockOutcomes>,
    }

    pub fn harness_with(config: OrchestratorConfig) -> Harness {
        let store = Arc::new(MockStore::default());
        let directory = Arc::new(MockDirectory::default());
        let outcomes = Arc::new(MockOutcomes::default());
        let service = ContactWorkflowService::new(
            config,
            WorkflowDependencies {
                store: store.clone(),
                uniqueness: directory.clone(),
                repository: directory.clone(),
                enums: Arc::new(MockEnums),
                outcomes: outcomes.clone(),
            },
        )
        .unwrap();
        Harness {
            service,
            store,
            directory,
            outcomes,
        }
    }

    pub fn harness() -> Harness {
        harness_with(OrchestratorConfig::default())
    }

    pub fn john() -> contactflow_core::contact::ContactPayload {
        contactflow_core::contact::ContactPayload {
            first_name: Some("John".into()),
            last_name: Some("Doe".into()),
            email: Some("john.doe@acme.io".into()),
            job_title: Some("Engineering Manager".into()),
            company: Some("Acme".into()),
            business_id: Some("john.doe.2024".into()),
            social_links: vec!["linkedin.com/in/john-doe".into()],
            ..Default::default()
        }
    }
}
