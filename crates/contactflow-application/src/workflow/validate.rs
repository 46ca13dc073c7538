use super::{ContactWorkflowService, ValidationResult};
use crate::external::with_timeout;
use crate::store_client::StoredSession;
use chrono::Utc;
use contactflow_core::batch::BusinessIdCollision;
use contactflow_core::collaborator::{UniquenessCheck, CONTACT_TYPE, INDUSTRY};
use contactflow_core::config::ManualReviewPolicy;
use contactflow_core::normalize::{business_id, contact_format, professional, social};
use contactflow_core::session::{ManualReviewResolution, ValidateOptions, WorkflowEvent, WorkflowState};
use contactflow_core::validation::ValidationOutcome;
use contactflow_core::{FlowError, Result};

/// Result of the uniqueness rule for one session.
enum Uniqueness {
    Unique,
    Unchecked,
    Collision(BusinessIdCollision),
}

impl ContactWorkflowService {
    /// Runs the business rules against a staged session.
    ///
    /// Format and reference-data problems land in `validation.errors` with
    /// `next_step = retry_validation`; a business id collision yields
    /// `next_step = manual_review` (or is resolved by suffixing under the
    /// `auto_suffix` policy). Only store or collaborator failures are errors.
    pub async fn validate(&self, session_id: &str, options: ValidateOptions) -> Result<ValidationResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state.transition(WorkflowEvent::ValidationPassed).is_err() {
            return Err(FlowError::invalid_state(session_id, state, "validate"));
        }
        if !stored
            .session
            .consume_retry(WorkflowEvent::ValidationPassed, self.config.max_retries)
        {
            return Err(self.exhaust_retries(stored).await);
        }

        let (outcome, uniqueness) = if options.skip_validation {
            let mut outcome = ValidationOutcome {
                email_valid: true,
                phone_valid: true,
                ..Default::default()
            };
            outcome.warnings.push("validation skipped".to_string());
            self.ensure_business_id(&mut stored, &mut outcome)?;
            (outcome, Uniqueness::Unchecked)
        } else {
            self.run_rules(&mut stored, &options).await?
        };

        let collisions: Vec<BusinessIdCollision> = match uniqueness {
            Uniqueness::Collision(c) => vec![c],
            _ => Vec::new(),
        };
        let event = if outcome.is_blocked() {
            WorkflowEvent::ValidationRejected
        } else if !collisions.is_empty() {
            WorkflowEvent::CollisionDetected
        } else {
            WorkflowEvent::ValidationPassed
        };
        let detail = match event {
            WorkflowEvent::ValidationRejected => Some(outcome.errors.join("; ")),
            WorkflowEvent::CollisionDetected => collisions
                .first()
                .map(|c| format!("'{}' held by {}", c.business_id, c.existing_contact_id)),
            _ => None,
        };

        let now = Utc::now();
        stored.session.last_validation = Some(outcome.clone());
        stored.session.apply(event, detail, now)?;
        self.sessions.save(&mut stored).await?;

        tracing::info!(
            session_id = %session_id,
            state = %stored.session.state,
            rules = outcome.applied_rules.len(),
            errors = outcome.errors.len(),
            warnings = outcome.warnings.len(),
            "Contact validated"
        );
        Ok(ValidationResult::from_session(&stored.session, outcome, collisions))
    }

    /// Brings a `manual_review` session back into validation.
    ///
    /// `AcceptSuffix` and `ReplaceBusinessId` clear the colliding id first
    /// and then run a full validation pass; `Reject` fails the session.
    pub async fn resolve_manual_review(
        &self,
        session_id: &str,
        resolution: ManualReviewResolution,
    ) -> Result<ValidationResult> {
        let mut stored = self.sessions.require(session_id).await?;
        let state = stored.session.state;
        if state != WorkflowState::ManualReview {
            return Err(FlowError::invalid_state(session_id, state, "resolve_manual_review"));
        }

        let replacement = match resolution {
            ManualReviewResolution::Reject(reason) => {
                self.mark_failed(&mut stored, "manual_review_rejected", reason)
                    .await?;
                let outcome = stored.session.last_validation.clone().unwrap_or_default();
                return Ok(ValidationResult::from_session(&stored.session, outcome, Vec::new()));
            }
            ManualReviewResolution::AcceptSuffix => {
                let base = stored
                    .session
                    .business_id
                    .clone()
                    .ok_or_else(|| FlowError::internal("manual review session without business id"))?;
                match self.first_free_suffix(&base).await? {
                    Some(free) => free,
                    None => return Err(self.collision_error(&stored, &base).await),
                }
            }
            ManualReviewResolution::ReplaceBusinessId(candidate) => {
                let candidate = business_id::canonicalize(&candidate);
                if !business_id::is_valid(&candidate) {
                    return Err(FlowError::invalid_argument(format!(
                        "'{}' is not a valid business id",
                        candidate
                    )));
                }
                let check = self.check_uniqueness(&candidate).await?;
                if !check.unique {
                    return Err(FlowError::UniquenessCollision {
                        session_id: session_id.to_string(),
                        business_id: candidate,
                        existing_contact_id: check.existing_contact_id.unwrap_or_default(),
                    });
                }
                candidate
            }
        };

        let now = Utc::now();
        stored.session.clear_business_id("manual_review", now);
        stored.session.assign_business_id(replacement.clone(), false, now)?;
        self.sessions.save(&mut stored).await?;
        tracing::info!(
            session_id = %session_id,
            business_id = %replacement,
            "Manual review resolved, re-validating"
        );

        self.validate(session_id, ValidateOptions::default()).await
    }

    async fn run_rules(
        &self,
        stored: &mut StoredSession,
        options: &ValidateOptions,
    ) -> Result<(ValidationOutcome, Uniqueness)> {
        let mut outcome = ValidationOutcome::default();
        let session = &mut stored.session;

        if options.skip_social_normalization {
            outcome.social_normalized = false;
            outcome.warnings.push("social normalization skipped".to_string());
        } else {
            outcome.rule("social_normalization");
            let extracted = social::extract_profiles(&session.payload);
            let mut all_ok = extracted.unrecognized.is_empty();
            let mut profiles = extracted.profiles;
            for profile in profiles.values_mut() {
                match social::normalize_profile(profile.platform, &profile.raw_url) {
                    Ok(normalized) => *profile = normalized,
                    Err(e) => {
                        all_ok = false;
                        outcome.warnings.push(e.to_string());
                    }
                }
            }
            for link in extracted.unrecognized {
                outcome
                    .warnings
                    .push(format!("social link '{}' matches no known platform", link));
            }
            session.social_profiles = profiles;
            outcome.social_normalized = all_ok;
        }

        outcome.rule("email_format");
        outcome.email_valid = match session.payload.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(email) if !contact_format::is_valid_email(email) => {
                outcome.errors.push(format!("email '{}' is not a valid address", email));
                false
            }
            _ => true,
        };

        outcome.rule("phone_format");
        outcome.phone_valid = match session.payload.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(phone) if !contact_format::is_valid_phone(phone) => {
                outcome.errors.push(format!("phone '{}' is not a valid number", phone));
                false
            }
            _ => true,
        };

        outcome.rule("reference_data");
        if let Some(kind) = session.payload.contact_type.as_deref().filter(|v| !v.trim().is_empty()) {
            if !self.enums.is_valid(CONTACT_TYPE, kind) {
                outcome.errors.push(format!("contact type '{}' is not recognized", kind));
            }
        }
        if let Some(industry) = session.payload.industry.as_deref().filter(|v| !v.trim().is_empty()) {
            if !self.enums.is_valid(INDUSTRY, industry) {
                outcome
                    .warnings
                    .push(format!("industry '{}' is not a known value", industry));
            }
        }

        if options.analyze_professional {
            outcome.rule("professional_analysis");
            outcome.professional = Some(professional::analyze(&session.payload, &session.social_profiles));
        }

        self.ensure_business_id(stored, &mut outcome)?;

        let uniqueness = if options.skip_uniqueness {
            outcome.warnings.push("business id uniqueness not checked".to_string());
            Uniqueness::Unchecked
        } else {
            outcome.rule("business_id_uniqueness");
            self.check_session_id_uniqueness(stored, &mut outcome).await?
        };
        Ok((outcome, uniqueness))
    }

    /// Every validated session carries a business id; derive or generate one if missing.
    fn ensure_business_id(&self, stored: &mut StoredSession, outcome: &mut ValidationOutcome) -> Result<()> {
        let session = &mut stored.session;
        if session.business_id.is_some() {
            return Ok(());
        }
        let now = Utc::now();
        match business_id::candidate_from_payload(&session.payload).filter(|id| business_id::is_valid(id)) {
            Some(candidate) => session.assign_business_id(candidate, false, now),
            None => {
                let generated = business_id::generate(&session.payload);
                outcome
                    .warnings
                    .push(format!("business id '{}' was generated", generated));
                session.assign_business_id(generated, true, now)
            }
        }
    }

    async fn check_session_id_uniqueness(
        &self,
        stored: &mut StoredSession,
        outcome: &mut ValidationOutcome,
    ) -> Result<Uniqueness> {
        let Some(candidate) = stored.session.business_id.clone() else {
            return Ok(Uniqueness::Unchecked);
        };
        let check = self.check_uniqueness(&candidate).await?;
        if check.unique {
            outcome.business_id_unique = true;
            return Ok(Uniqueness::Unique);
        }

        let existing_contact_id = check.existing_contact_id.unwrap_or_default();
        if self.config.manual_review_policy == ManualReviewPolicy::AutoSuffix {
            if let Some(free) = self.first_free_suffix(&candidate).await? {
                let now = Utc::now();
                let session = &mut stored.session;
                let generated = session.business_id_generated;
                session.clear_business_id(&format!("collision with {}", existing_contact_id), now);
                session.assign_business_id(free.clone(), generated, now)?;
                outcome.business_id_unique = true;
                outcome.warnings.push(format!(
                    "business id '{}' was taken; reassigned to '{}'",
                    candidate, free
                ));
                return Ok(Uniqueness::Unique);
            }
        }

        outcome.business_id_unique = false;
        Ok(Uniqueness::Collision(BusinessIdCollision {
            session_id: stored.session.session_id.clone(),
            business_id: candidate,
            existing_contact_id,
        }))
    }

    pub(crate) async fn check_uniqueness(&self, candidate: &str) -> Result<UniquenessCheck> {
        tracing::debug!(business_id = %candidate, "Checking business id uniqueness");
        with_timeout(
            self.config.external_call_timeout(),
            "uniqueness check",
            self.uniqueness.check(candidate),
        )
        .await
    }

    /// `base-2` … `base-(max_suffix_attempts + 1)`, first one that is free.
    async fn first_free_suffix(&self, base: &str) -> Result<Option<String>> {
        for n in 2..=self.config.max_suffix_attempts + 1 {
            let candidate = business_id::with_suffix(base, n);
            if self.check_uniqueness(&candidate).await?.unique {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn collision_error(&self, stored: &StoredSession, business_id: &str) -> FlowError {
        let existing_contact_id = match self.check_uniqueness(business_id).await {
            Ok(check) => check.existing_contact_id.unwrap_or_default(),
            Err(e) => return e,
        };
        FlowError::UniquenessCollision {
            session_id: stored.session.session_id.clone(),
            business_id: business_id.to_string(),
            existing_contact_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use contactflow_core::config::ManualReviewPolicy;
    use contactflow_core::contact::ContactPayload;
    use contactflow_core::session::{
        ManualReviewResolution, NextStep, StageOptions, ValidateOptions, WorkflowState,
    };
    use contactflow_core::{FlowError, OrchestratorConfig};

    #[tokio::test]
    async fn test_unique_business_id_passes() {
        let h = harness();
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let result = h
            .service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();
        assert!(result.business_id_unique);
        assert_eq!(result.next_step, NextStep::Persistence);
        assert!(result.validation.social_normalized);
        assert!(result.validation.applied_rules.contains(&"business_id_uniqueness".to_string()));
        assert!(result.validation.professional.is_some());
    }

    #[tokio::test]
    async fn test_collision_routes_to_manual_review() {
        let h = harness();
        h.directory.taken.lock().await.insert("john.doe.2024".into());
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let result = h
            .service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.next_step, NextStep::ManualReview);
        assert!(!result.business_id_unique);
        assert_eq!(result.business_id_collisions.len(), 1);
        assert_eq!(result.business_id_collisions[0].existing_contact_id, "existing_john.doe.2024");
    }

    #[tokio::test]
    async fn test_format_errors_route_to_retry_validation() {
        let h = harness();
        let payload = ContactPayload {
            email: Some("john@".into()),
            phone: Some("12".into()),
            contact_type: Some("alien".into()),
            industry: Some("astrology".into()),
            ..john()
        };
        let staged = h.service.stage(payload, "acct_1", StageOptions::default()).await.unwrap();
        let result = h
            .service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, WorkflowState::ValidationFailed);
        assert_eq!(result.next_step, NextStep::RetryValidation);
        assert_eq!(result.errors().len(), 3);
        assert!(result.warnings().iter().any(|w| w.contains("astrology")));
        assert!(!result.validation.email_valid);
        assert!(!result.validation.phone_valid);
    }

    #[tokio::test]
    async fn test_auto_suffix_policy() {
        let h = harness_with(OrchestratorConfig {
            manual_review_policy: ManualReviewPolicy::AutoSuffix,
            ..Default::default()
        });
        {
            let mut taken = h.directory.taken.lock().await;
            taken.insert("john.doe.2024".into());
            taken.insert("john.doe.2024-2".into());
        }
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let result = h
            .service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.next_step, NextStep::Persistence);
        assert_eq!(result.business_id.as_deref(), Some("john.doe.2024-3"));

        let session = h.service.get_staged(&staged.session_id).await.unwrap().unwrap();
        assert!(session.history.iter().any(|e| e.outcome == "business_id_cleared"));
    }

    #[tokio::test]
    async fn test_resolve_manual_review() {
        let h = harness();
        h.directory.taken.lock().await.insert("john.doe.2024".into());
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();

        h.directory.taken.lock().await.insert("jd.taken".into());
        let err = h
            .service
            .resolve_manual_review(
                &staged.session_id,
                ManualReviewResolution::ReplaceBusinessId("jd.taken".into()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UniquenessCollision { .. }));

        let result = h
            .service
            .resolve_manual_review(&staged.session_id, ManualReviewResolution::AcceptSuffix)
            .await
            .unwrap();
        assert_eq!(result.next_step, NextStep::Persistence);
        assert_eq!(result.business_id.as_deref(), Some("john.doe.2024-2"));
    }

    #[tokio::test]
    async fn test_reject_manual_review_fails_session() {
        let h = harness();
        h.directory.taken.lock().await.insert("john.doe.2024".into());
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        h.service
            .validate(&staged.session_id, ValidateOptions::default())
            .await
            .unwrap();
        let result = h
            .service
            .resolve_manual_review(&staged.session_id, ManualReviewResolution::Reject("duplicate person".into()))
            .await
            .unwrap();
        assert_eq!(result.status, WorkflowState::Failed);
        let outcomes = h.outcomes.recorded.lock().await;
        assert_eq!(outcomes[0].failure_reason.as_deref(), Some("manual_review_rejected"));
    }

    #[tokio::test]
    async fn test_validation_retries_are_bounded() {
        let h = harness();
        let payload = ContactPayload {
            email: Some("broken@".into()),
            ..john()
        };
        let staged = h.service.stage(payload, "acct_1", StageOptions::default()).await.unwrap();
        let id = staged.session_id;
        h.service.validate(&id, ValidateOptions::default()).await.unwrap();
        for _ in 0..3 {
            let r = h.service.validate(&id, ValidateOptions::default()).await.unwrap();
            assert_eq!(r.next_step, NextStep::RetryValidation);
        }
        let err = h.service.validate(&id, ValidateOptions::default()).await.unwrap_err();
        assert!(matches!(err, FlowError::RetryExhausted { max_retries: 3, .. }));
        let session = h.service.get_staged(&id).await.unwrap().unwrap();
        assert_eq!(session.state, WorkflowState::Failed);
    }

    #[tokio::test]
    async fn test_revalidating_manual_review_consumes_retries() {
        let h = harness();
        h.directory.taken.lock().await.insert("john.doe.2024".into());
        let staged = h.service.stage(john(), "acct_1", StageOptions::default()).await.unwrap();
        let id = staged.session_id;
        h.service.validate(&id, ValidateOptions::default()).await.unwrap();
        for attempt in 1..=3 {
            let r = h.service.validate(&id, ValidateOptions::default()).await.unwrap();
            assert_eq!(r.next_step, NextStep::ManualReview);
            let session = h.service.get_staged(&id).await.unwrap().unwrap();
            assert_eq!(session.retry_count, attempt);
        }
        let err = h.service.validate(&id, ValidateOptions::default()).await.unwrap_err();
        assert!(matches!(err, FlowError::RetryExhausted { max_retries: 3, .. }));
        let session = h.service.get_staged(&id).await.unwrap().unwrap();
        assert_eq!(session.state, WorkflowState::Failed);
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let h = harness();
        let err = h
            .service
            .validate("sess_contact_gone", ValidateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
