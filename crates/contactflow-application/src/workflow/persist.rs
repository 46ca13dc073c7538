use super::{CompletionResult, ContactWorkflowService, PersistResult, ReconcileResult, TransitionResult};
use crate::external::with_timeout;
use chrono::Utc;
use contactflow_core::collaborator::ContactRecord;
use contactflow_core::contact::preference;
use contactflow_core::normalize::business_id;
use contactflow_core::outcome::OutcomeKind;
use contactflow_core::session::{PersistOptions, PersistedContact, Session, WorkflowEvent, WorkflowState};
use contactflow_core::{FlowError, Result};

impl ContactWorkflowService {
    /// Creates the durable contact for a validated session.
    ///
    /// The session is written as `persisting` before the create call goes
    /// out. On success it becomes `completed` and stays readable for the
    /// completion grace TTL. On failure it becomes `persistence_failed` and
    /// the call returns `PersistenceFailed`; nothing is retried here.
    pub async fn persist(&self, session_id: &str, options: PersistOptions) -> Result<PersistResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state.transition(WorkflowEvent::PersistStarted).is_err() {
            return Err(FlowError::invalid_state(session_id, state, "persist"));
        }
        if !stored
            .session
            .consume_retry(WorkflowEvent::PersistStarted, self.config.max_retries)
        {
            return Err(self.exhaust_retries(stored).await);
        }

        let now = Utc::now();
        let session = &mut stored.session;
        if options.generate_business_id {
            session.clear_business_id("regenerated at persistence", now);
        }
        if session.business_id.is_none() {
            let generated = business_id::generate(&session.payload);
            session.assign_business_id(generated, true, now)?;
        }
        let business_id = session.business_id.clone().unwrap_or_default();
        session.apply(WorkflowEvent::PersistStarted, None, now)?;
        self.sessions.save(&mut stored).await?;

        let record = ContactRecord {
            account_id: stored.session.account_id.clone(),
            business_id: business_id.clone(),
            payload: stored.session.payload.clone(),
            social_profiles: stored.session.social_profiles.clone(),
        };
        tracing::debug!(session_id = %session_id, business_id = %business_id, "Creating contact");
        let created = with_timeout(
            self.config.external_call_timeout(),
            "contact create",
            self.repository.create(record),
        )
        .await;

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(session_id = %session_id, error = %reason, "Contact create failed");
                stored
                    .session
                    .apply(WorkflowEvent::PersistRejected, Some(reason.clone()), Utc::now())?;
                self.sessions.save(&mut stored).await?;
                return Err(FlowError::PersistenceFailed {
                    session_id: session_id.to_string(),
                    reason,
                });
            }
        };

        let mut warnings = Vec::new();
        let mut is_primary = false;
        if options.set_as_primary {
            let account_id = stored.session.account_id.clone();
            match with_timeout(
                self.config.external_call_timeout(),
                "set primary contact",
                self.repository.set_primary(&account_id, &created.contact_id),
            )
            .await
            {
                Ok(()) => is_primary = true,
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to set primary contact");
                    warnings.push(format!("contact created but not made primary: {}", e));
                }
            }
        }

        let now = Utc::now();
        let session = &mut stored.session;
        session.persisted = Some(PersistedContact {
            contact_id: created.contact_id.clone(),
            business_id: created.business_id.clone(),
            is_primary,
        });
        session.persisted_at = Some(now);
        session.apply(
            WorkflowEvent::PersistSucceeded,
            Some(created.contact_id.clone()),
            now,
        )?;
        session.reset_ttl(self.config.completed_grace_ttl_secs, now);
        self.sessions.save(&mut stored).await?;
        self.record_outcome(&stored.session, OutcomeKind::Completed, None, now)
            .await;

        let session = &stored.session;
        tracing::info!(
            session_id = %session_id,
            contact_id = %created.contact_id,
            business_id = %created.business_id,
            "Contact persisted"
        );
        Ok(PersistResult {
            session_id: session.session_id.clone(),
            contact_id: created.contact_id,
            business_id: created.business_id,
            business_id_generated: session.business_id_generated,
            is_primary,
            status: session.state,
            next_step: session.next_step(),
            communication_preference: preference::summarize(
                &session.payload,
                session.social_profiles.values(),
            ),
            persisted_at: now,
            warnings,
        })
    }

    /// Sends a session whose persistence failed back to validation.
    pub async fn retry_validation(&self, session_id: &str) -> Result<TransitionResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state.transition(WorkflowEvent::RetryValidation).is_err() {
            return Err(FlowError::invalid_state(session_id, state, "retry_validation"));
        }
        if !stored
            .session
            .consume_retry(WorkflowEvent::RetryValidation, self.config.max_retries)
        {
            return Err(self.exhaust_retries(stored).await);
        }
        stored
            .session
            .apply(WorkflowEvent::RetryValidation, None, Utc::now())?;
        self.sessions.save(&mut stored).await?;
        tracing::info!(session_id = %session_id, "Session sent back to validation");
        Ok(TransitionResult::from(&stored.session))
    }

    /// Settles a session left in `persisting` by a create call whose outcome
    /// was never recorded (process death, a failed session write).
    ///
    /// Only sessions untouched for longer than the stale window qualify; a
    /// younger one may still have its create in flight and yields `Conflict`.
    /// The session moves to `persistence_failed`, from where it can be
    /// retried, sent back to validation, cancelled or failed. A contact now
    /// holding the business id is reported but not adopted.
    pub async fn reconcile_persistence(&self, session_id: &str) -> Result<ReconcileResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state != WorkflowState::Persisting {
            return Err(FlowError::invalid_state(session_id, state, "reconcile_persistence"));
        }

        let stale_after = self.config.persist_stale_after();
        let idle = (Utc::now() - stored.session.last_updated_at)
            .to_std()
            .unwrap_or_default();
        if idle <= stale_after {
            return Err(FlowError::conflict(
                session_id,
                format!(
                    "contact create may still be in flight; reconcile after {}ms idle",
                    stale_after.as_millis()
                ),
            ));
        }

        let existing_contact_id = match stored.session.business_id.clone() {
            Some(business_id) => self.check_uniqueness(&business_id).await?.existing_contact_id,
            None => None,
        };
        let detail = match &existing_contact_id {
            Some(contact_id) => format!("persistence outcome unknown; business id now held by {}", contact_id),
            None => "persistence outcome unknown".to_string(),
        };
        stored
            .session
            .apply(WorkflowEvent::PersistRejected, Some(detail), Utc::now())?;
        self.sessions.save(&mut stored).await?;
        tracing::warn!(
            session_id = %session_id,
            existing_contact_id = ?existing_contact_id,
            "Reconciled stale persisting session"
        );

        let session = &stored.session;
        Ok(ReconcileResult {
            session_id: session.session_id.clone(),
            status: session.state,
            next_step: session.next_step(),
            business_id: session.business_id.clone(),
            existing_contact_id,
        })
    }

    /// Marks completion once and returns the follow-up actions.
    ///
    /// Repeated calls return the same result without writing.
    pub async fn complete(&self, session_id: &str) -> Result<CompletionResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state != WorkflowState::Completed {
            return Err(FlowError::invalid_state(session_id, state, "complete"));
        }

        if stored.session.completed_at.is_none() {
            let now = Utc::now();
            stored.session.completed_at = Some(now);
            stored.session.record("completion_marked", None, now);
            stored.session.touch(now);
            self.sessions.save(&mut stored).await?;
            tracing::info!(session_id = %session_id, "Workflow completed");
        }

        let session = &stored.session;
        Ok(CompletionResult {
            session_id: session.session_id.clone(),
            contact_id: session.persisted.as_ref().map(|p| p.contact_id.clone()),
            business_id: session.business_id.clone(),
            completed_at: session.completed_at.unwrap_or(session.last_updated_at),
            next_actions: next_actions(session),
        })
    }
}

/// Follow-ups suggested once a contact exists.
fn next_actions(session: &Session) -> Vec<String> {
    let mut actions = Vec::new();
    let payload = &session.payload;
    if payload.email.as_deref().is_some_and(|e| !e.trim().is_empty()) {
        actions.push("send_welcome_email".to_string());
    }
    if payload.phone.as_deref().is_some_and(|p| !p.trim().is_empty()) {
        actions.push("schedule_intro_call".to_string());
    }
    if !session.social_profiles.is_empty() {
        actions.push("connect_on_social".to_string());
    }
    let analysis = session
        .last_validation
        .as_ref()
        .and_then(|v| v.professional.as_ref());
    if analysis.is_some_and(|a| !a.suggestions.is_empty()) {
        actions.push("send_networking_suggestions".to_string());
    }
    if session.persisted.as_ref().is_some_and(|p| !p.is_primary) {
        actions.push("review_primary_contact".to_string());
    }
    actions
}
