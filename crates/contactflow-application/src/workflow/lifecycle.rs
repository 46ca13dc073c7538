use super::{CancelResult, ContactWorkflowService, ExtendResult, TransitionResult};
use chrono::Utc;
use contactflow_core::config::MAX_SESSION_TTL_SECS;
use contactflow_core::session::WorkflowState;
use contactflow_core::{FlowError, Result};

impl ContactWorkflowService {
    /// Pushes `expires_at` out by exactly `additional_ttl_secs`.
    pub async fn extend_session(&self, session_id: &str, additional_ttl_secs: u64) -> Result<ExtendResult> {
        if additional_ttl_secs == 0 {
            return Err(FlowError::invalid_argument("additional TTL must be positive"));
        }
        let mut stored = self.sessions.require(session_id).await?;
        let session = &mut stored.session;
        if session.is_terminal() {
            return Err(FlowError::invalid_state(session_id, session.state, "extend_session"));
        }
        let new_ttl = session.ttl_secs.saturating_add(additional_ttl_secs);
        if new_ttl > MAX_SESSION_TTL_SECS {
            return Err(FlowError::invalid_argument(format!(
                "extended TTL {}s would exceed {}s",
                new_ttl, MAX_SESSION_TTL_SECS
            )));
        }

        session.extend(additional_ttl_secs, Utc::now());
        self.sessions.save(&mut stored).await?;

        let session = &stored.session;
        tracing::info!(
            session_id = %session_id,
            expires_at = %session.expires_at,
            total_extensions = session.total_extensions,
            "Session extended"
        );
        Ok(ExtendResult {
            session_id: session.session_id.clone(),
            expires_at: session.expires_at,
            ttl_secs: session.ttl_secs,
            total_extensions: session.total_extensions,
        })
    }

    /// Deletes the session.
    ///
    /// Absent and terminal sessions report `cancelled: true`. A session whose
    /// create call may be in flight is refused with `Conflict`.
    pub async fn cancel_session(&self, session_id: &str) -> Result<CancelResult> {
        let Some(stored) = self.sessions.load(session_id).await? else {
            return Ok(CancelResult {
                session_id: session_id.to_string(),
                cancelled: true,
                was_present: false,
            });
        };
        if stored.session.state.is_mid_persistence() {
            tracing::warn!(session_id = %session_id, "Refusing to cancel mid-persistence");
            return Err(FlowError::conflict(
                session_id,
                "a contact create is in flight; reconcile_persistence once it is stale",
            ));
        }

        self.sessions.delete(session_id).await?;
        tracing::info!(session_id = %session_id, state = %stored.session.state, "Session cancelled");
        Ok(CancelResult {
            session_id: session_id.to_string(),
            cancelled: true,
            was_present: true,
        })
    }

    /// Abandons a session: moves it to `failed` and records the outcome.
    ///
    /// Failing an already failed session is a no-op.
    pub async fn fail_session(&self, session_id: &str, reason: &str) -> Result<TransitionResult> {
        let mut stored = self.sessions.require(session_id).await?;
        match stored.session.state {
            WorkflowState::Failed => return Ok(TransitionResult::from(&stored.session)),
            WorkflowState::Persisting => {
                return Err(FlowError::conflict(
                    session_id,
                    "a contact create is in flight; wait for its outcome or reconcile_persistence",
                ));
            }
            _ => {}
        }
        self.mark_failed(&mut stored, reason, format!("abandoned: {}", reason))
            .await?;
        Ok(TransitionResult::from(&stored.session))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use chrono::Duration;
    use contactflow_core::session::{PersistOptions, StageOptions, ValidateOptions, WorkflowState};
    use contactflow_core::FlowError;

    #[tokio::test]
    async fn test_extend_adds_exactly() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let before = h.service.get_staged(&staged.session_id).await.unwrap().unwrap();

        let result = h.service.extend_session(&staged.session_id, 3600).await.unwrap();
        assert_eq!(result.expires_at - before.expires_at, Duration::seconds(3600));
        assert_eq!(result.total_extensions, before.total_extensions + 1);

        let after = h.service.get_staged(&staged.session_id).await.unwrap().unwrap();
        assert_eq!(after.expires_at, after.last_updated_at + Duration::seconds(after.ttl_secs as i64));
    }

    #[tokio::test]
    async fn test_extend_is_capped() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let err = h.service.extend_session(&staged.session_id, 86_400).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let first = h.service.cancel_session(&staged.session_id).await.unwrap();
        assert!(first.cancelled && first.was_present);
        let second = h.service.cancel_session(&staged.session_id).await.unwrap();
        assert!(second.cancelled && !second.was_present);
        assert!(h.service.get_staged(&staged.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_terminal_session() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service.validate(&staged.session_id, ValidateOptions::default()).await.unwrap();
        h.service.persist(&staged.session_id, PersistOptions::default()).await.unwrap();
        assert!(h.service.cancel_session(&staged.session_id).await.unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_cancel_mid_persistence_conflicts() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service.validate(&staged.session_id, ValidateOptions::default()).await.unwrap();

        // Freeze the session as if a create call were in flight.
        let mut stored = h.service.sessions().require(&staged.session_id).await.unwrap();
        stored.session.state = WorkflowState::Persisting;
        h.service.sessions().save(&mut stored).await.unwrap();

        let err = h.service.cancel_session(&staged.session_id).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(h.service.get_staged(&staged.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancel_after_reconciling_stale_persistence() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service.validate(&staged.session_id, ValidateOptions::default()).await.unwrap();

        let mut stored = h.service.sessions().require(&staged.session_id).await.unwrap();
        stored.session.state = WorkflowState::Persisting;
        stored.session.last_updated_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        h.service.sessions().save(&mut stored).await.unwrap();

        let err = h.service.fail_session(&staged.session_id, "operator gave up").await.unwrap_err();
        assert!(err.is_conflict());

        h.service.reconcile_persistence(&staged.session_id).await.unwrap();
        let cancelled = h.service.cancel_session(&staged.session_id).await.unwrap();
        assert!(cancelled.was_present);
        assert!(h.service.get_staged(&staged.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_session() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let result = h.service.fail_session(&staged.session_id, "duplicate_lead").await.unwrap();
        assert_eq!(result.status, WorkflowState::Failed);
        let again = h.service.fail_session(&staged.session_id, "duplicate_lead").await.unwrap();
        assert_eq!(again.status, WorkflowState::Failed);

        let outcomes = h.outcomes.recorded.lock().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].failure_reason.as_deref(), Some("duplicate_lead"));

        drop(outcomes);
        let err = h.service.extend_session(&staged.session_id, 60).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidState { .. }));
    }
}
