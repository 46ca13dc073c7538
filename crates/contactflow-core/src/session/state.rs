//! Canonical workflow state machine.
//!
//! Every session is in exactly one [`WorkflowState`]. The externally visible
//! `step` and `next_step` labels are projections of that state, so the two can
//! never drift apart. All movement between states goes through
//! [`WorkflowState::transition`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse workflow step reported to callers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStep {
    Staging,
    Validation,
    Persistence,
    Completed,
    Failed,
}

/// Next-action hint attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NextStep {
    /// Call `validate`.
    Validation,
    /// Call `persist`.
    Persistence,
    /// Call `complete` (or nothing further is required).
    Complete,
    /// Fix the payload via `update_staged`, or resubmit.
    RetryStaging,
    /// Call `validate` again.
    RetryValidation,
    /// Call `persist` again.
    RetryPersistence,
    /// A human (or `resolve_manual_review`) has to settle a business id collision.
    ManualReview,
}

/// The single source of truth for where a session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowState {
    /// Captured and structurally valid, waiting for validation.
    Staged,
    /// Structural checks failed; the payload must be fixed.
    StagingRejected,
    /// Sent back from persistence for another validation pass.
    ValidationPending,
    /// Blocking business-rule or format violations.
    ValidationFailed,
    /// Business id collides with an existing contact.
    ManualReview,
    /// All validation passed; ready to persist.
    Validated,
    /// A create call to the permanent store is in flight.
    Persisting,
    /// The permanent store rejected the create.
    PersistenceFailed,
    /// Durable record exists.
    Completed,
    /// Terminal failure.
    Failed,
}

/// Inputs to the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowEvent {
    StageAccepted,
    StageRejected,
    ValidationPassed,
    ValidationRejected,
    CollisionDetected,
    PersistStarted,
    PersistSucceeded,
    PersistRejected,
    /// Retry edge validation → staging.
    RetryStaging,
    /// Retry edge persistence → validation.
    RetryValidation,
    Fail,
}

/// Rejected transition; carries both ends for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: WorkflowState,
    pub event: WorkflowEvent,
}

impl WorkflowState {
    /// Coarse step label.
    pub fn step(self) -> WorkflowStep {
        match self {
            Self::Staged | Self::StagingRejected => WorkflowStep::Staging,
            Self::ValidationPending
            | Self::ValidationFailed
            | Self::ManualReview
            | Self::Validated => WorkflowStep::Validation,
            Self::Persisting | Self::PersistenceFailed => WorkflowStep::Persistence,
            Self::Completed => WorkflowStep::Completed,
            Self::Failed => WorkflowStep::Failed,
        }
    }

    /// Next-action hint.
    pub fn next_step(self) -> NextStep {
        match self {
            Self::Staged => NextStep::Validation,
            Self::StagingRejected | Self::Failed => NextStep::RetryStaging,
            Self::ValidationPending | Self::ValidationFailed => NextStep::RetryValidation,
            Self::ManualReview => NextStep::ManualReview,
            Self::Validated | Self::Persisting => NextStep::Persistence,
            Self::PersistenceFailed => NextStep::RetryPersistence,
            Self::Completed => NextStep::Complete,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// True while a durable side effect may be in flight.
    pub fn is_mid_persistence(self) -> bool {
        matches!(self, Self::Persisting)
    }

    /// Whether applying `event` from this state consumes one retry.
    pub fn is_retry(self, event: WorkflowEvent) -> bool {
        matches!(
            (self, event),
            (_, WorkflowEvent::RetryStaging)
                | (_, WorkflowEvent::RetryValidation)
                | (Self::StagingRejected, WorkflowEvent::StageAccepted)
                | (Self::StagingRejected, WorkflowEvent::StageRejected)
                | (Self::ValidationFailed, WorkflowEvent::ValidationPassed)
                | (Self::ValidationFailed, WorkflowEvent::ValidationRejected)
                | (Self::ValidationFailed, WorkflowEvent::CollisionDetected)
                | (Self::ManualReview, WorkflowEvent::ValidationPassed)
                | (Self::ManualReview, WorkflowEvent::ValidationRejected)
                | (Self::ManualReview, WorkflowEvent::CollisionDetected)
                | (Self::PersistenceFailed, WorkflowEvent::PersistStarted)
        )
    }

    /// The transition function.
    pub fn transition(self, event: WorkflowEvent) -> Result<WorkflowState, IllegalTransition> {
        use WorkflowEvent as E;
        use WorkflowState as S;

        let next = match (self, event) {
            (S::Completed | S::Failed, _) => None,
            // Persisting can only be left through the outcome of the create call.
            (S::Persisting, E::PersistSucceeded) => Some(S::Completed),
            (S::Persisting, E::PersistRejected) => Some(S::PersistenceFailed),
            (S::Persisting, _) => None,
            (_, E::Fail) => Some(S::Failed),

            (S::Staged | S::StagingRejected, E::StageAccepted) => Some(S::Staged),
            (S::Staged | S::StagingRejected, E::StageRejected) => Some(S::StagingRejected),

            (
                S::Staged | S::ValidationPending | S::ValidationFailed | S::ManualReview | S::Validated,
                E::ValidationPassed,
            ) => Some(S::Validated),
            (
                S::Staged | S::ValidationPending | S::ValidationFailed | S::ManualReview | S::Validated,
                E::ValidationRejected,
            ) => Some(S::ValidationFailed),
            (
                S::Staged | S::ValidationPending | S::ValidationFailed | S::ManualReview | S::Validated,
                E::CollisionDetected,
            ) => Some(S::ManualReview),

            (S::Validated | S::PersistenceFailed, E::PersistStarted) => Some(S::Persisting),

            (
                S::ValidationPending | S::ValidationFailed | S::ManualReview | S::Validated,
                E::RetryStaging,
            ) => Some(S::Staged),
            (S::PersistenceFailed, E::RetryValidation) => Some(S::ValidationPending),

            _ => None,
        };

        next.ok_or(IllegalTransition { from: self, event })
    }
}
