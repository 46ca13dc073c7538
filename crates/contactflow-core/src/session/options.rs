//! Per-call options for workflow operations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageOptions {
    /// Overrides the configured session TTL. Bounds-checked.
    pub session_ttl_secs: Option<u64>,
    /// Skips the structural checks.
    pub skip_validation: bool,
    /// Set by the bulk coordinator for batch members.
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateOptions {
    pub skip_validation: bool,
    pub skip_uniqueness: bool,
    pub skip_social_normalization: bool,
    pub analyze_professional: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            skip_validation: false,
            skip_uniqueness: false,
            skip_social_normalization: false,
            analyze_professional: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistOptions {
    /// Replace the candidate id with a freshly generated one.
    pub generate_business_id: bool,
    /// Point the account's primary contact at the new record.
    pub set_as_primary: bool,
}

/// How a parked `manual_review` session gets back into validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum ManualReviewResolution {
    /// Take the first free `base-N` id.
    AcceptSuffix,
    /// Use a caller-chosen id.
    ReplaceBusinessId(String),
    /// Give up on the contact.
    Reject(String),
}
