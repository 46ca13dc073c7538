//! Error types for the contact workflow orchestrator.

use crate::session::{NextStep, WorkflowState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of failures the orchestrator reports.
///
/// Format and uniqueness problems found while validating are normally folded
/// into structured results; the `ValidationFailed` and `UniquenessCollision`
/// variants exist for the places where such a problem must stop an operation
/// (bulk members, manual review resolution).
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FlowError {
    /// Session absent or expired.
    #[error("Session not found: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// Operation attempted out of sequence.
    #[error("Session '{session_id}' is in state '{state}', cannot {operation}")]
    InvalidState {
        session_id: String,
        state: WorkflowState,
        operation: String,
    },

    /// Blocking business-rule or format violation.
    #[error("Validation failed for '{session_id}': {}", .reasons.join("; "))]
    ValidationFailed {
        session_id: String,
        reasons: Vec<String>,
    },

    /// Business id already bound to another durable contact.
    #[error("Business id '{business_id}' already belongs to contact '{existing_contact_id}'")]
    UniquenessCollision {
        session_id: String,
        business_id: String,
        existing_contact_id: String,
    },

    /// The permanent store rejected the create; the session is preserved.
    #[error("Persistence failed for '{session_id}': {reason}")]
    PersistenceFailed { session_id: String, reason: String },

    /// Maximum retry count exceeded; the session is now failed.
    #[error("Retry limit of {max_retries} exhausted for '{session_id}'")]
    RetryExhausted { session_id: String, max_retries: u32 },

    /// An external call or a batch deadline elapsed.
    #[error("Timed out after {elapsed_ms}ms: {operation}")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// Work abandoned because its batch was aborted.
    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    /// Concurrent modification or a request that would race an in-flight side effect.
    #[error("Conflict on '{session_id}': {message}")]
    Conflict { session_id: String, message: String },

    /// Caller supplied an out-of-bounds option.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Session store unreachable or misbehaving.
    #[error("Session store error: {0}")]
    Store(String),

    /// Permanent store or uniqueness service failed unexpectedly.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    pub fn invalid_state(
        session_id: impl Into<String>,
        state: WorkflowState,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            session_id: session_id.into(),
            state,
            operation: operation.into(),
        }
    }

    pub fn conflict(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailed { .. }
                | Self::Timeout { .. }
                | Self::Cancelled { .. }
                | Self::Conflict { .. }
                | Self::Store(_)
                | Self::Repository(_)
                | Self::ValidationFailed { .. }
        )
    }

    /// Session the error refers to, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionNotFound { session_id }
            | Self::InvalidState { session_id, .. }
            | Self::ValidationFailed { session_id, .. }
            | Self::UniquenessCollision { session_id, .. }
            | Self::PersistenceFailed { session_id, .. }
            | Self::RetryExhausted { session_id, .. }
            | Self::Conflict { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// Next-action hint for callers that only see the error.
    pub fn next_step(&self) -> Option<NextStep> {
        match self {
            Self::SessionNotFound { .. } | Self::RetryExhausted { .. } => {
                Some(NextStep::RetryStaging)
            }
            Self::InvalidState { state, .. } => Some(state.next_step()),
            Self::ValidationFailed { .. } => Some(NextStep::RetryValidation),
            Self::UniquenessCollision { .. } => Some(NextStep::ManualReview),
            Self::PersistenceFailed { .. } => Some(NextStep::RetryPersistence),
            _ => None,
        }
    }

    /// Stable category used when grouping failures.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "session_not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::UniquenessCollision { .. } => "uniqueness_collision",
            Self::PersistenceFailed { .. } => "persistence_failed",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Conflict { .. } => "conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Store(_) => "store",
            Self::Repository(_) => "repository",
            Self::Serialization { .. } => "serialization",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for FlowError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, FlowError>`.
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_step_hints() {
        let err = FlowError::PersistenceFailed {
            session_id: "s".into(),
            reason: "down".into(),
        };
        assert_eq!(err.next_step(), Some(NextStep::RetryPersistence));
        assert!(err.is_retryable());

        let err = FlowError::invalid_state("s", WorkflowState::ManualReview, "persist");
        assert_eq!(err.next_step(), Some(NextStep::ManualReview));
        assert_eq!(err.session_id(), Some("s"));
    }

    #[test]
    fn test_not_found_is_distinct_from_store_failure() {
        assert!(FlowError::session_not_found("x").is_not_found());
        assert!(!FlowError::store("connection refused").is_not_found());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = FlowError::timeout("uniqueness check", 10);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(err.category(), "timeout");
    }
}
