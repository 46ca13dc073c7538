//! In-process session store with per-key TTL and revision stamps.

use async_trait::async_trait;
use contactflow_core::session::{SessionStore, StoredValue};
use contactflow_core::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    revision: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Stand-in for the external key-value store.
///
/// Expired entries are evicted lazily on access and by [`purge_expired`].
/// Revisions keep increasing across delete and re-create of a key so that a
/// stale compare-and-swap can never succeed by accident.
///
/// [`purge_expired`]: InMemorySessionStore::purge_expired
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    next_revision: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drops every expired entry; returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired session store entries");
        }
        purged
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining time to live of a key.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let revision = self.bump();
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                revision,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.is_live(now) => {
                    return Ok(Some(StoredValue {
                        value: e.value.clone(),
                        revision: e.revision,
                    }));
                }
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn put_if_revision(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        expected: Option<u64>,
    ) -> Result<Option<u64>> {
        let now = Instant::now();
        // One write guard covers both the check and the insert.
        let mut entries = self.entries.write().await;
        let current = entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.revision);
        if current != expected {
            return Ok(None);
        }
        let revision = self.bump();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                revision,
                expires_at: now + ttl,
            },
        );
        Ok(Some(revision))
    }
}
