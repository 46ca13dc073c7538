use super::{ContactWorkflowService, StageResult, TransitionResult};
use crate::store_client::StoredSession;
use chrono::{DateTime, Utc};
use contactflow_core::config::check_session_ttl;
use contactflow_core::contact::{ContactPayload, ContactPayloadPatch};
use contactflow_core::normalize::{business_id, social};
use contactflow_core::session::{Session, StageOptions, WorkflowEvent, WorkflowState};
use contactflow_core::validation::{check_structure, StructuralReport};
use contactflow_core::{FlowError, Result};

impl ContactWorkflowService {
    /// Creates a session from `payload` and writes it once.
    ///
    /// Structural problems do not fail the call; they come back as `errors`
    /// with `next_step = retry_staging`.
    pub async fn stage(
        &self,
        payload: ContactPayload,
        account_id: &str,
        options: StageOptions,
    ) -> Result<StageResult> {
        if account_id.trim().is_empty() {
            return Err(FlowError::invalid_argument("account id must not be empty"));
        }
        let ttl_secs = options
            .session_ttl_secs
            .unwrap_or(self.config.session_ttl_secs);
        check_session_ttl(ttl_secs)?;

        let now = Utc::now();
        let mut session = Session::new(account_id, payload, ttl_secs, now);
        session.batch_id = options.batch_id;

        let report = if options.skip_validation {
            StructuralReport::default()
        } else {
            check_structure(&session.payload)
        };
        let (warnings, errors) = capture(&mut session, report, now)?;

        let mut stored = StoredSession::fresh(session);
        self.sessions.save(&mut stored).await?;

        let session = &stored.session;
        tracing::info!(
            session_id = %session.session_id,
            account_id = %session.account_id,
            state = %session.state,
            "Contact staged"
        );
        Ok(StageResult::from_session(session, warnings, errors))
    }

    /// `None` when the session is absent or expired.
    pub async fn get_staged(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.load(session_id).await?.map(|s| s.session))
    }

    /// Merges `patch` into the working payload and re-runs the staging checks.
    ///
    /// Only allowed while the session is still in staging. Re-staging a
    /// rejected session counts as a retry.
    pub async fn update_staged(
        &self,
        session_id: &str,
        patch: ContactPayloadPatch,
    ) -> Result<StageResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if !matches!(state, WorkflowState::Staged | WorkflowState::StagingRejected) {
            return Err(FlowError::invalid_state(session_id, state, "update_staged"));
        }
        if !stored
            .session
            .consume_retry(WorkflowEvent::StageAccepted, self.config.max_retries)
        {
            return Err(self.exhaust_retries(stored).await);
        }

        let now = Utc::now();
        stored.session.payload.apply_patch(patch);
        let report = check_structure(&stored.session.payload);
        let (warnings, errors) = capture(&mut stored.session, report, now)?;
        self.sessions.save(&mut stored).await?;

        tracing::info!(
            session_id = %session_id,
            state = %stored.session.state,
            retry_count = stored.session.retry_count,
            "Staged contact updated"
        );
        Ok(StageResult::from_session(&stored.session, warnings, errors))
    }

    /// Sends a session from validation back to staging.
    ///
    /// `clear_business_id` drops the assigned id (recorded in history), the
    /// only way to get a different one derived on the next pass.
    pub async fn retry_staging(
        &self,
        session_id: &str,
        clear_business_id: bool,
    ) -> Result<TransitionResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state.transition(WorkflowEvent::RetryStaging).is_err() {
            return Err(FlowError::invalid_state(session_id, state, "retry_staging"));
        }
        if !stored
            .session
            .consume_retry(WorkflowEvent::RetryStaging, self.config.max_retries)
        {
            return Err(self.exhaust_retries(stored).await);
        }

        let now = Utc::now();
        if clear_business_id {
            stored.session.clear_business_id("retry_staging", now);
        }
        stored
            .session
            .apply(WorkflowEvent::RetryStaging, None, now)?;
        self.sessions.save(&mut stored).await?;

        tracing::info!(
            session_id = %session_id,
            retry_count = stored.session.retry_count,
            "Session sent back to staging"
        );
        Ok(TransitionResult::from(&stored.session))
    }
}

/// Applies a staging report: profiles, candidate business id and the
/// accept/reject transition. Returns the (warnings, errors) to report.
fn capture(
    session: &mut Session,
    report: StructuralReport,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, Vec<String>)> {
    let StructuralReport { errors, mut warnings } = report;

    let extracted = social::extract_profiles(&session.payload);
    for link in &extracted.unrecognized {
        warnings.push(format!("social link '{}' matches no known platform", link));
    }
    for link in &extracted.duplicates {
        warnings.push(format!("ignored additional link '{}' for an already linked platform", link));
    }
    session.social_profiles = extracted.profiles;

    let candidate = business_id::candidate_from_payload(&session.payload)
        .filter(|id| business_id::is_valid(id));
    if candidate != session.business_id {
        session.clear_business_id("payload changed", now);
        if let Some(id) = candidate {
            session.assign_business_id(id, false, now)?;
        }
    }

    let (event, detail) = if errors.is_empty() {
        (WorkflowEvent::StageAccepted, None)
    } else {
        (WorkflowEvent::StageRejected, Some(errors.join("; ")))
    };
    session.apply(event, detail, now)?;
    Ok((warnings, errors))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use contactflow_core::contact::ContactPayloadPatch;
    use contactflow_core::session::{NextStep, StageOptions, WorkflowState, WorkflowStep};
    use contactflow_core::FlowError;

    #[tokio::test]
    async fn test_stage_then_get_returns_input() {
        let h = harness();
        let result = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        assert_eq!(result.next_step, NextStep::Validation);
        assert_eq!(result.business_id.as_deref(), Some("john.doe.2024"));

        let session = h.service.get_staged(&result.session_id).await.unwrap().unwrap();
        assert_eq!(session.payload, john());
        assert_eq!(session.step(), WorkflowStep::Staging);
        assert_eq!(session.expires_at, session.last_updated_at + chrono::Duration::seconds(7200));
    }

    #[tokio::test]
    async fn test_structural_failure_is_a_result() {
        let h = harness();
        let payload = contactflow_core::contact::ContactPayload {
            email: Some("someone@acme.io".into()),
            ..Default::default()
        };
        let result = h.service.stage(payload, "acct_1", StageOptions::default()).await.unwrap();
        assert_eq!(result.status, WorkflowState::StagingRejected);
        assert_eq!(result.next_step, NextStep::RetryStaging);
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_bounds() {
        let h = harness();
        for ttl in [299, 86_401] {
            let options = StageOptions {
                session_ttl_secs: Some(ttl),
                ..Default::default()
            };
            let err = h.service.stage(john(), "acct_1", options).await.unwrap_err();
            assert!(matches!(err, FlowError::InvalidArgument(_)));
        }
        assert!(h.store.data.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_absent_session_reads_as_none() {
        let h = harness();
        assert!(h.service.get_staged("sess_contact_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_staged_fixes_rejected_payload() {
        let h = harness();
        let payload = contactflow_core::contact::ContactPayload {
            email: Some("someone@acme.io".into()),
            ..Default::default()
        };
        let staged = h.service.stage(payload, "acct_1", StageOptions::default()).await.unwrap();
        let patch = ContactPayloadPatch {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..Default::default()
        };
        let updated = h.service.update_staged(&staged.session_id, patch).await.unwrap();
        assert_eq!(updated.status, WorkflowState::Staged);
        assert_eq!(updated.business_id.as_deref(), Some("ada.lovelace"));

        let session = h.service.get_staged(&staged.session_id).await.unwrap().unwrap();
        assert_eq!(session.retry_count, 1);
    }

    #[tokio::test]
    async fn test_update_staged_after_validation_is_invalid_state() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service
            .validate(&staged.session_id, Default::default())
            .await
            .unwrap();
        let err = h
            .service
            .update_staged(&staged.session_id, ContactPayloadPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidState { state: WorkflowState::Validated, .. }));
    }

    #[tokio::test]
    async fn test_retry_staging_clears_business_id_explicitly() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service
            .validate(&staged.session_id, Default::default())
            .await
            .unwrap();
        let back = h.service.retry_staging(&staged.session_id, true).await.unwrap();
        assert_eq!(back.status, WorkflowState::Staged);
        assert_eq!(back.business_id, None);
        assert_eq!(back.retry_count, 1);

        let session = h.service.get_staged(&staged.session_id).await.unwrap().unwrap();
        assert!(session.history.iter().any(|e| e.outcome == "business_id_cleared"));
    }
}
