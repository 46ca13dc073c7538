//! Terminal workflow outcomes, the only input of analytics.

use crate::error::Result;
use crate::normalize::{Department, IndustryCategory, JobLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub session_id: String,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub kind: OutcomeKind,
    /// Error category for failed outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub normalized_profile_count: usize,
    pub business_id_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_level: Option<JobLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_category: Option<IndustryCategory>,
    pub has_linkedin: bool,
    pub is_business_email: bool,
}

impl WorkflowOutcome {
    pub fn processing_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Selects outcomes by account and/or batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeFilter {
    pub account_id: Option<String>,
    pub batch_id: Option<String>,
}

impl OutcomeFilter {
    pub fn account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            batch_id: None,
        }
    }

    pub fn batch(batch_id: impl Into<String>) -> Self {
        Self {
            account_id: None,
            batch_id: Some(batch_id.into()),
        }
    }

    pub fn matches(&self, outcome: &WorkflowOutcome) -> bool {
        self.account_id.as_ref().is_none_or(|a| *a == outcome.account_id)
            && self
                .batch_id
                .as_ref()
                .is_none_or(|b| outcome.batch_id.as_ref() == Some(b))
    }
}

#[async_trait]
pub trait OutcomeLog: Send + Sync {
    async fn record(&self, outcome: WorkflowOutcome) -> Result<()>;

    async fn list(&self, filter: &OutcomeFilter) -> Result<Vec<WorkflowOutcome>>;
}
