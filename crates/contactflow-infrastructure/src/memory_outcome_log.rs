//! Append-only in-process outcome log.

use async_trait::async_trait;
use contactflow_core::outcome::{OutcomeFilter, OutcomeLog, WorkflowOutcome};
use contactflow_core::Result;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryOutcomeLog {
    outcomes: RwLock<Vec<WorkflowOutcome>>,
}

impl InMemoryOutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.outcomes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.read().await.is_empty()
    }
}

#[async_trait]
impl OutcomeLog for InMemoryOutcomeLog {
    async fn record(&self, outcome: WorkflowOutcome) -> Result<()> {
        self.outcomes.write().await.push(outcome);
        Ok(())
    }

    async fn list(&self, filter: &OutcomeFilter) -> Result<Vec<WorkflowOutcome>> {
        Ok(self
            .outcomes
            .read()
            .await
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contactflow_core::outcome::OutcomeKind;

    fn outcome(account: &str, batch: Option<&str>) -> WorkflowOutcome {
        let now = Utc::now();
        WorkflowOutcome {
            session_id: "s".into(),
            account_id: account.into(),
            batch_id: batch.map(str::to_string),
            kind: OutcomeKind::Completed,
            failure_reason: None,
            started_at: now,
            finished_at: now,
            normalized_profile_count: 0,
            business_id_generated: false,
            job_level: None,
            department: None,
            industry_category: None,
            has_linkedin: false,
            is_business_email: false,
        }
    }

    #[tokio::test]
    async fn test_filtering() {
        let log = InMemoryOutcomeLog::new();
        log.record(outcome("a", Some("b1"))).await.unwrap();
        log.record(outcome("a", None)).await.unwrap();
        log.record(outcome("z", Some("b2"))).await.unwrap();

        assert_eq!(log.list(&OutcomeFilter::account("a")).await.unwrap().len(), 2);
        assert_eq!(log.list(&OutcomeFilter::batch("b2")).await.unwrap().len(), 1);
        assert_eq!(log.list(&OutcomeFilter::default()).await.unwrap().len(), 3);
    }
}
