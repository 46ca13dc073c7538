//! In-process permanent contact store.
//!
//! Implements both [`ContactRepository`] and [`UniquenessChecker`] over one
//! business id index, so a create is visible to the next uniqueness check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contactflow_core::collaborator::{
    ContactRecord, ContactRepository, CreatedContact, UniquenessCheck, UniquenessChecker,
};
use contactflow_core::{FlowError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredContact {
    pub contact_id: String,
    pub record: ContactRecord,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RepositoryState {
    contacts: HashMap<String, StoredContact>,
    /// Canonical business id to contact id.
    by_business_id: HashMap<String, String>,
    /// Account id to primary contact id.
    primary: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryContactRepository {
    state: RwLock<RepositoryState>,
    failing_business_ids: RwLock<HashSet<String>>,
    fail_next_creates: AtomicUsize,
    latency: Option<Duration>,
    create_calls: AtomicUsize,
    check_calls: AtomicUsize,
}

fn index_key(business_id: &str) -> String {
    business_id.trim().to_ascii_lowercase()
}

fn new_contact_id() -> String {
    format!("contact_{}", Uuid::new_v4().simple())
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Inserts an existing contact that owns `business_id`; returns its id.
    pub async fn seed(&self, account_id: &str, business_id: &str) -> String {
        let contact_id = new_contact_id();
        let record = ContactRecord {
            account_id: account_id.to_string(),
            business_id: business_id.to_string(),
            payload: Default::default(),
            social_profiles: Default::default(),
        };
        let mut state = self.state.write().await;
        state
            .by_business_id
            .insert(index_key(business_id), contact_id.clone());
        state.contacts.insert(
            contact_id.clone(),
            StoredContact {
                contact_id: contact_id.clone(),
                record,
                created_at: Utc::now(),
            },
        );
        contact_id
    }

    /// Makes every create for `business_id` fail.
    pub async fn fail_creates_for(&self, business_id: &str) {
        self.failing_business_ids
            .write()
            .await
            .insert(index_key(business_id));
    }

    /// Makes the next `n` creates fail, whatever their business id.
    pub fn fail_next_creates(&self, n: usize) {
        self.fail_next_creates.store(n, Ordering::SeqCst);
    }

    pub async fn get(&self, contact_id: &str) -> Option<StoredContact> {
        self.state.read().await.contacts.get(contact_id).cloned()
    }

    pub async fn find_by_business_id(&self, business_id: &str) -> Option<StoredContact> {
        let state = self.state.read().await;
        state
            .by_business_id
            .get(&index_key(business_id))
            .and_then(|id| state.contacts.get(id))
            .cloned()
    }

    pub async fn primary_contact(&self, account_id: &str) -> Option<String> {
        self.state.read().await.primary.get(account_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.contacts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl UniquenessChecker for InMemoryContactRepository {
    async fn check(&self, candidate_business_id: &str) -> Result<UniquenessCheck> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(match state.by_business_id.get(&index_key(candidate_business_id)) {
            Some(existing) => UniquenessCheck::taken_by(existing.clone()),
            None => UniquenessCheck::unique(),
        })
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn create(&self, record: ContactRecord) -> Result<CreatedContact> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let key = index_key(&record.business_id);
        if self.take_injected_failure() || self.failing_business_ids.read().await.contains(&key) {
            return Err(FlowError::repository(format!(
                "create rejected for business id '{}'",
                record.business_id
            )));
        }

        let mut state = self.state.write().await;
        if let Some(existing) = state.by_business_id.get(&key) {
            return Err(FlowError::repository(format!(
                "business id '{}' already belongs to contact '{}'",
                record.business_id, existing
            )));
        }

        let contact_id = new_contact_id();
        let business_id = record.business_id.clone();
        state.by_business_id.insert(key, contact_id.clone());
        state.contacts.insert(
            contact_id.clone(),
            StoredContact {
                contact_id: contact_id.clone(),
                record,
                created_at: Utc::now(),
            },
        );
        tracing::debug!(contact_id = %contact_id, business_id = %business_id, "Contact created");
        Ok(CreatedContact {
            contact_id,
            business_id,
        })
    }

    async fn set_primary(&self, account_id: &str, contact_id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        match state.contacts.get(contact_id) {
            Some(c) if c.record.account_id == account_id => {
                state
                    .primary
                    .insert(account_id.to_string(), contact_id.to_string());
                Ok(())
            }
            Some(_) => Err(FlowError::repository(format!(
                "contact '{}' does not belong to account '{}'",
                contact_id, account_id
            ))),
            None => Err(FlowError::repository(format!(
                "contact '{}' not found",
                contact_id
            ))),
        }
    }
}
