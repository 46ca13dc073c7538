//! Analytics Aggregator.
//!
//! Read-side summaries over the outcome log. Values are always derived;
//! the per-account cache is only dropped by explicit invalidation.

use contactflow_core::normalize::{Department, IndustryCategory, JobLevel};
use contactflow_core::outcome::{OutcomeFilter, OutcomeKind, OutcomeLog, WorkflowOutcome};
use contactflow_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReason {
    pub reason: String,
    pub count: usize,
    /// Share of all failures, 0-100.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkingDistribution {
    pub job_levels: BTreeMap<JobLevel, usize>,
    pub departments: BTreeMap<Department, usize>,
    pub industries: BTreeMap<IndustryCategory, usize>,
    pub linkedin_profiles: usize,
    pub business_emails: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactAnalytics {
    pub total_processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed over processed, 0-100.
    pub success_rate: f64,
    pub average_processing_secs: f64,
    /// Most frequent first.
    pub common_failure_reasons: Vec<FailureReason>,
    /// Completed contacts with at least one normalized social profile, 0-100.
    pub social_media_adoption_rate: f64,
    /// Completed contacts whose business id was generated, 0-100.
    pub business_id_generation_rate: f64,
    /// Over completed contacts.
    pub networking: NetworkingDistribution,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl ContactAnalytics {
    pub fn from_outcomes(outcomes: &[WorkflowOutcome]) -> Self {
        let completed: Vec<&WorkflowOutcome> = outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Completed)
            .collect();
        let failed = outcomes.len() - completed.len();

        let average_processing_secs = if outcomes.is_empty() {
            0.0
        } else {
            outcomes.iter().map(WorkflowOutcome::processing_secs).sum::<f64>() / outcomes.len() as f64
        };

        let mut reasons: HashMap<&str, usize> = HashMap::new();
        for o in outcomes.iter().filter(|o| o.kind == OutcomeKind::Failed) {
            *reasons
                .entry(o.failure_reason.as_deref().unwrap_or("unknown"))
                .or_default() += 1;
        }
        let mut common_failure_reasons: Vec<FailureReason> = reasons
            .into_iter()
            .map(|(reason, count)| FailureReason {
                reason: reason.to_string(),
                count,
                percentage: percent(count, failed),
            })
            .collect();
        common_failure_reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));

        let mut networking = NetworkingDistribution::default();
        for o in &completed {
            if let Some(level) = o.job_level {
                *networking.job_levels.entry(level).or_default() += 1;
            }
            if let Some(department) = o.department {
                *networking.departments.entry(department).or_default() += 1;
            }
            if let Some(industry) = o.industry_category {
                *networking.industries.entry(industry).or_default() += 1;
            }
            networking.linkedin_profiles += usize::from(o.has_linkedin);
            networking.business_emails += usize::from(o.is_business_email);
        }

        let with_social = completed.iter().filter(|o| o.normalized_profile_count > 0).count();
        let generated = completed.iter().filter(|o| o.business_id_generated).count();

        Self {
            total_processed: outcomes.len(),
            completed: completed.len(),
            failed,
            success_rate: percent(completed.len(), outcomes.len()),
            average_processing_secs,
            common_failure_reasons,
            social_media_adoption_rate: percent(with_social, completed.len()),
            business_id_generation_rate: percent(generated, completed.len()),
            networking,
        }
    }
}

pub struct AnalyticsAggregator {
    outcomes: Arc<dyn OutcomeLog>,
    cache: Option<RwLock<HashMap<String, ContactAnalytics>>>,
}

impl AnalyticsAggregator {
    /// Caches account summaries until invalidated.
    pub fn new(outcomes: Arc<dyn OutcomeLog>) -> Self {
        Self {
            outcomes,
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Recomputes on every call.
    pub fn uncached(outcomes: Arc<dyn OutcomeLog>) -> Self {
        Self {
            outcomes,
            cache: None,
        }
    }

    pub async fn account_summary(&self, account_id: &str) -> Result<ContactAnalytics> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.read().await.get(account_id) {
                return Ok(hit.clone());
            }
        }
        let outcomes = self.outcomes.list(&OutcomeFilter::account(account_id)).await?;
        let summary = ContactAnalytics::from_outcomes(&outcomes);
        tracing::debug!(account_id = %account_id, total = summary.total_processed, "Computed account analytics");
        if let Some(cache) = &self.cache {
            cache
                .write()
                .await
                .insert(account_id.to_string(), summary.clone());
        }
        Ok(summary)
    }

    /// Never cached.
    pub async fn batch_summary(&self, batch_id: &str) -> Result<ContactAnalytics> {
        let outcomes = self.outcomes.list(&OutcomeFilter::batch(batch_id)).await?;
        Ok(ContactAnalytics::from_outcomes(&outcomes))
    }

    pub async fn invalidate(&self, account_id: &str) {
        if let Some(cache) = &self.cache {
            cache.write().await.remove(account_id);
        }
    }

    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.write().await.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockLog {
        outcomes: Mutex<Vec<WorkflowOutcome>>,
    }

    #[async_trait]
    impl OutcomeLog for MockLog {
        async fn record(&self, outcome: WorkflowOutcome) -> Result<()> {
            self.outcomes.lock().await.push(outcome);
            Ok(())
        }

        async fn list(&self, filter: &OutcomeFilter) -> Result<Vec<WorkflowOutcome>> {
            Ok(self
                .outcomes
                .lock()
                .await
                .iter()
                .filter(|o| filter.matches(o))
                .cloned()
                .collect())
        }
    }

    fn outcome(kind: OutcomeKind, reason: Option<&str>, secs: i64) -> WorkflowOutcome {
        let start = Utc::now();
        WorkflowOutcome {
            session_id: "s".into(),
            account_id: "acct".into(),
            batch_id: Some("b1".into()),
            kind,
            failure_reason: reason.map(str::to_string),
            started_at: start,
            finished_at: start + Duration::seconds(secs),
            normalized_profile_count: 1,
            business_id_generated: false,
            job_level: Some(JobLevel::Manager),
            department: Some(Department::Engineering),
            industry_category: Some(IndustryCategory::Technology),
            has_linkedin: true,
            is_business_email: true,
        }
    }

    #[test]
    fn test_summary() {
        let mut generated = outcome(OutcomeKind::Completed, None, 4);
        generated.business_id_generated = true;
        generated.normalized_profile_count = 0;
        let outcomes = vec![
            outcome(OutcomeKind::Completed, None, 2),
            generated,
            outcome(OutcomeKind::Failed, Some("uniqueness_collision"), 1),
            outcome(OutcomeKind::Failed, Some("uniqueness_collision"), 1),
            outcome(OutcomeKind::Failed, Some("timeout"), 2),
        ];
        let a = ContactAnalytics::from_outcomes(&outcomes);
        assert_eq!(a.total_processed, 5);
        assert_eq!(a.completed, 2);
        assert_eq!(a.failed, 3);
        assert!((a.success_rate - 40.0).abs() < 1e-9);
        assert!((a.average_processing_secs - 2.0).abs() < 1e-9);
        assert_eq!(a.common_failure_reasons[0].reason, "uniqueness_collision");
        assert_eq!(a.common_failure_reasons[0].count, 2);
        let total: f64 = a.common_failure_reasons.iter().map(|r| r.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!((a.social_media_adoption_rate - 50.0).abs() < 1e-9);
        assert!((a.business_id_generation_rate - 50.0).abs() < 1e-9);
        assert_eq!(a.networking.job_levels[&JobLevel::Manager], 2);
        assert_eq!(a.networking.linkedin_profiles, 2);
    }

    #[test]
    fn test_empty() {
        let a = ContactAnalytics::from_outcomes(&[]);
        assert_eq!(a.total_processed, 0);
        assert_eq!(a.success_rate, 0.0);
        assert!(a.common_failure_reasons.is_empty());
    }

    #[tokio::test]
    async fn test_cache_needs_explicit_invalidation() {
        let log = Arc::new(MockLog::default());
        let analytics = AnalyticsAggregator::new(log.clone());
        log.record(outcome(OutcomeKind::Completed, None, 1)).await.unwrap();
        assert_eq!(analytics.account_summary("acct").await.unwrap().total_processed, 1);

        log.record(outcome(OutcomeKind::Failed, Some("timeout"), 1)).await.unwrap();
        assert_eq!(analytics.account_summary("acct").await.unwrap().total_processed, 1);
        analytics.invalidate("acct").await;
        assert_eq!(analytics.account_summary("acct").await.unwrap().total_processed, 2);

        assert_eq!(analytics.batch_summary("b1").await.unwrap().failed, 1);
        analytics.invalidate_all().await;
        let uncached = AnalyticsAggregator::uncached(log);
        assert_eq!(uncached.account_summary("acct").await.unwrap().completed, 1);
    }
}
