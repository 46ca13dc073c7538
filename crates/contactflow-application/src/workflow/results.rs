//! Result shapes returned by the workflow operations.
//!
//! Each carries the canonical state plus its `step`/`next_step` projections.

use chrono::{DateTime, Utc};
use contactflow_core::batch::BusinessIdCollision;
use contactflow_core::contact::{CommunicationPreference, SocialPlatform, SocialProfile};
use contactflow_core::session::{NextStep, Session, WorkflowState, WorkflowStep};
use contactflow_core::validation::ValidationOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub session_id: String,
    pub account_id: String,
    pub status: WorkflowState,
    pub step: WorkflowStep,
    pub next_step: NextStep,
    pub business_id: Option<String>,
    pub social_profiles: BTreeMap<SocialPlatform, SocialProfile>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl StageResult {
    pub(crate) fn from_session(session: &Session, warnings: Vec<String>, errors: Vec<String>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            account_id: session.account_id.clone(),
            status: session.state,
            step: session.step(),
            next_step: session.next_step(),
            business_id: session.business_id.clone(),
            social_profiles: session.social_profiles.clone(),
            warnings,
            errors,
            expires_at: session.expires_at,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == WorkflowState::Staged
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub session_id: String,
    pub status: WorkflowState,
    pub step: WorkflowStep,
    pub next_step: NextStep,
    pub business_id: Option<String>,
    pub business_id_unique: bool,
    pub business_id_collisions: Vec<BusinessIdCollision>,
    pub validation: ValidationOutcome,
    pub social_profiles: BTreeMap<SocialPlatform, SocialProfile>,
}

impl ValidationResult {
    pub(crate) fn from_session(
        session: &Session,
        validation: ValidationOutcome,
        business_id_collisions: Vec<BusinessIdCollision>,
    ) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.state,
            step: session.step(),
            next_step: session.next_step(),
            business_id: session.business_id.clone(),
            business_id_unique: validation.business_id_unique,
            business_id_collisions,
            validation,
            social_profiles: session.social_profiles.clone(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.validation.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.validation.errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistResult {
    pub session_id: String,
    pub contact_id: String,
    pub business_id: String,
    pub business_id_generated: bool,
    pub is_primary: bool,
    pub status: WorkflowState,
    pub next_step: NextStep,
    pub communication_preference: CommunicationPreference,
    pub persisted_at: DateTime<Utc>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub session_id: String,
    pub contact_id: Option<String>,
    pub business_id: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendResult {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub total_extensions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResult {
    pub session_id: String,
    pub cancelled: bool,
    /// Whether a live session was actually removed.
    pub was_present: bool,
}

/// Outcome of settling a session stuck in `persisting`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub session_id: String,
    pub status: WorkflowState,
    pub next_step: NextStep,
    pub business_id: Option<String>,
    /// Set when the business id is now held by a contact; it may be the one
    /// the lost create call produced.
    pub existing_contact_id: Option<String>,
}

/// Outcome of a bare transition (retry edges, explicit failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub session_id: String,
    pub status: WorkflowState,
    pub step: WorkflowStep,
    pub next_step: NextStep,
    pub business_id: Option<String>,
    pub retry_count: u32,
}

impl From<&Session> for TransitionResult {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.state,
            step: session.step(),
            next_step: session.next_step(),
            business_id: session.business_id.clone(),
            retry_count: session.retry_count,
        }
    }
}
