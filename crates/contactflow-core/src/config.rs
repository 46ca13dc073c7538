//! Orchestrator configuration.
//!
//! One explicit struct, handed to every component at construction time.

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 7200;
pub const MIN_SESSION_TTL_SECS: u64 = 300;
pub const MAX_SESSION_TTL_SECS: u64 = 86_400;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_PROCESSING_TIME_SECS: u64 = 1800;
pub const MIN_PROCESSING_TIME_SECS: u64 = 60;
pub const MAX_PROCESSING_TIME_SECS: u64 = 3600;

/// How a business id collision found during validation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualReviewPolicy {
    /// Park the session in `manual_review` until `resolve_manual_review` is called.
    #[default]
    ResolutionEndpoint,
    /// Try `base-2`, `base-3`, ... during validation and take the first free one.
    AutoSuffix,
}

/// Concurrency policy for session writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Plain put; the last write wins.
    #[default]
    LastWriterWins,
    /// Conditional put against the revision that was read.
    CompareAndSwap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Default staging TTL.
    pub session_ttl_secs: u64,
    /// TTL applied once a session reaches `completed`.
    pub completed_grace_ttl_secs: u64,
    pub max_retries: u32,
    pub default_batch_size: usize,
    pub max_processing_time_secs: u64,
    /// Applied to every session store, uniqueness and repository call.
    pub external_call_timeout_ms: u64,
    pub session_key_prefix: String,
    pub batch_key_prefix: String,
    pub batch_retention_ttl_secs: u64,
    pub manual_review_policy: ManualReviewPolicy,
    /// Suffixes tried by `AutoSuffix` and by `resolve_manual_review`.
    pub max_suffix_attempts: u32,
    pub write_policy: WritePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            completed_grace_ttl_secs: 300,
            max_retries: DEFAULT_MAX_RETRIES,
            default_batch_size: DEFAULT_BATCH_SIZE,
            max_processing_time_secs: DEFAULT_MAX_PROCESSING_TIME_SECS,
            external_call_timeout_ms: 10_000,
            session_key_prefix: "contact_session:".to_string(),
            batch_key_prefix: "contact_batch:".to_string(),
            batch_retention_ttl_secs: 86_400,
            manual_review_policy: ManualReviewPolicy::default(),
            max_suffix_attempts: 5,
            write_policy: WritePolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Checks every value against its bounds.
    pub fn validate(&self) -> Result<()> {
        check_session_ttl(self.session_ttl_secs).map_err(|e| FlowError::config(e.to_string()))?;
        check_batch_size(self.default_batch_size).map_err(|e| FlowError::config(e.to_string()))?;
        check_processing_time(self.max_processing_time_secs)
            .map_err(|e| FlowError::config(e.to_string()))?;
        if self.completed_grace_ttl_secs == 0 {
            return Err(FlowError::config("completed_grace_ttl_secs must be positive"));
        }
        if self.external_call_timeout_ms == 0 {
            return Err(FlowError::config("external_call_timeout_ms must be positive"));
        }
        if self.session_key_prefix.is_empty() || self.batch_key_prefix.is_empty() {
            return Err(FlowError::config("key prefixes must not be empty"));
        }
        if self.session_key_prefix == self.batch_key_prefix {
            return Err(FlowError::config(
                "session and batch key prefixes must differ",
            ));
        }
        Ok(())
    }

    pub fn external_call_timeout(&self) -> Duration {
        Duration::from_millis(self.external_call_timeout_ms)
    }

    /// How long a session may sit in `persisting` before its create call is
    /// presumed lost. Three call timeouts: the create plus the session writes
    /// around it.
    pub fn persist_stale_after(&self) -> Duration {
        self.external_call_timeout() * 3
    }
}

pub fn check_session_ttl(ttl_secs: u64) -> Result<()> {
    if !(MIN_SESSION_TTL_SECS..=MAX_SESSION_TTL_SECS).contains(&ttl_secs) {
        return Err(FlowError::invalid_argument(format!(
            "session TTL {}s outside {}..={}s",
            ttl_secs, MIN_SESSION_TTL_SECS, MAX_SESSION_TTL_SECS
        )));
    }
    Ok(())
}

pub fn check_batch_size(batch_size: usize) -> Result<()> {
    if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
        return Err(FlowError::invalid_argument(format!(
            "batch size {} outside 1..={}",
            batch_size, MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

pub fn check_processing_time(secs: u64) -> Result<()> {
    if !(MIN_PROCESSING_TIME_SECS..=MAX_PROCESSING_TIME_SECS).contains(&secs) {
        return Err(FlowError::invalid_argument(format!(
            "max processing time {}s outside {}..={}s",
            secs, MIN_PROCESSING_TIME_SECS, MAX_PROCESSING_TIME_SECS
        )));
    }
    Ok(())
}
