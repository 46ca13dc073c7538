//! Batch aggregate.

use crate::error::FlowError;
use crate::session::random_suffix;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

pub const BATCH_ID_PREFIX: &str = "batch_contact_";

/// `batch_contact_<unix millis>_<9 random lowercase alphanumerics>`.
pub fn new_batch_id(now: DateTime<Utc>) -> String {
    format!("{}{}_{}", BATCH_ID_PREFIX, now.timestamp_millis(), random_suffix(9))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
    PartialFailure,
    Failed,
}

/// Furthest step a member has reached. Each member sits in exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberPosition {
    Staged,
    Validated,
    Persisted,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounters {
    pub staged: usize,
    pub validated: usize,
    pub persisted: usize,
    pub failed: usize,
}

impl BatchCounters {
    pub fn total(&self) -> usize {
        self.staged + self.validated + self.persisted + self.failed
    }

    fn bucket(&mut self, position: MemberPosition) -> &mut usize {
        match position {
            MemberPosition::Staged => &mut self.staged,
            MemberPosition::Validated => &mut self.validated,
            MemberPosition::Persisted => &mut self.persisted,
            MemberPosition::Failed => &mut self.failed,
        }
    }

    /// Moves one member from `from` (or from nowhere) into `to`.
    pub fn advance(&mut self, from: Option<MemberPosition>, to: MemberPosition) {
        if let Some(from) = from {
            let slot = self.bucket(from);
            *slot = slot.saturating_sub(1);
        }
        *self.bucket(to) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    /// Position of the payload in the submission.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub error: FlowError,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessIdCollision {
    pub session_id: String,
    pub business_id: String,
    pub existing_contact_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub batch_id: String,
    pub account_id: String,
    pub total_contacts: usize,
    pub counters: BatchCounters,
    pub completed_contact_ids: Vec<String>,
    pub failures: Vec<BatchFailure>,
    pub collisions: Vec<BusinessIdCollision>,
    pub status: BatchStatus,
    /// Set when `continue_on_error` was off and a member failed.
    #[serde(default)]
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(account_id: impl Into<String>, total_contacts: usize, now: DateTime<Utc>) -> Self {
        Self {
            batch_id: new_batch_id(now),
            account_id: account_id.into(),
            total_contacts,
            counters: BatchCounters::default(),
            completed_contact_ids: Vec::new(),
            failures: Vec::new(),
            collisions: Vec::new(),
            status: BatchStatus::InProgress,
            aborted: false,
            started_at: now,
            finished_at: None,
            estimated_completion: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BatchStatus::InProgress
    }

    /// Members that reached a terminal position.
    pub fn finished_members(&self) -> usize {
        self.counters.persisted + self.counters.failed
    }

    pub fn reconciles(&self) -> bool {
        self.counters.total() == self.total_contacts
    }

    /// Projects the finish time from the throughput so far.
    pub fn refresh_estimate(&mut self, now: DateTime<Utc>) {
        let done = self.finished_members();
        if done == 0 || self.is_terminal() {
            return;
        }
        let elapsed_ms = (now - self.started_at).num_milliseconds().max(0);
        let per_member = elapsed_ms / done as i64;
        let remaining = self.total_contacts.saturating_sub(done) as i64;
        self.estimated_completion = Some(now + Duration::milliseconds(per_member * remaining));
    }

    /// Final status from the failure count.
    pub fn settled_status(&self) -> BatchStatus {
        if self.aborted {
            return BatchStatus::Failed;
        }
        match self.counters.failed {
            0 => BatchStatus::Completed,
            n if n >= self.total_contacts => BatchStatus::Failed,
            _ => BatchStatus::PartialFailure,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.status = self.settled_status();
        self.finished_at = Some(now);
        self.estimated_completion = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(batch: &mut Batch, index: usize) {
        batch.counters.advance(Some(MemberPosition::Staged), MemberPosition::Failed);
        batch.failures.push(BatchFailure {
            index,
            session_id: None,
            error: FlowError::internal("boom"),
            retryable: false,
        });
    }

    #[test]
    fn test_batch_id_format() {
        let b = Batch::new("acct", 3, Utc::now());
        assert!(b.batch_id.starts_with(BATCH_ID_PREFIX));
        assert_eq!(b.status, BatchStatus::InProgress);
    }

    #[test]
    fn test_counters_are_positional() {
        let mut c = BatchCounters::default();
        c.advance(None, MemberPosition::Staged);
        c.advance(Some(MemberPosition::Staged), MemberPosition::Validated);
        c.advance(Some(MemberPosition::Validated), MemberPosition::Persisted);
        assert_eq!(c, BatchCounters { staged: 0, validated: 0, persisted: 1, failed: 0 });
        assert_eq!(c.total(), 1);
    }

    #[test]
    fn test_settled_status() {
        let now = Utc::now();
        let mut b = Batch::new("acct", 2, now);
        for _ in 0..2 {
            b.counters.advance(None, MemberPosition::Staged);
        }
        b.counters.advance(Some(MemberPosition::Staged), MemberPosition::Persisted);
        fail(&mut b, 1);
        assert_eq!(b.settled_status(), BatchStatus::PartialFailure);

        let mut all_failed = Batch::new("acct", 1, now);
        all_failed.counters.advance(None, MemberPosition::Staged);
        fail(&mut all_failed, 0);
        assert_eq!(all_failed.settled_status(), BatchStatus::Failed);

        let mut aborted = b.clone();
        aborted.aborted = true;
        aborted.finish(now);
        assert_eq!(aborted.status, BatchStatus::Failed);
        assert!(aborted.reconciles());
    }

    #[test]
    fn test_empty_batch_completes() {
        let mut b = Batch::new("acct", 0, Utc::now());
        b.finish(Utc::now());
        assert_eq!(b.status, BatchStatus::Completed);
        assert!(b.reconciles());
    }

    #[test]
    fn test_estimate() {
        let start = Utc::now();
        let mut b = Batch::new("acct", 4, start);
        b.counters.advance(None, MemberPosition::Persisted);
        b.refresh_estimate(start + Duration::seconds(10));
        assert_eq!(
            b.estimated_completion,
            Some(start + Duration::seconds(40))
        );
    }
}
