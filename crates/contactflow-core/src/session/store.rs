//! Session store seam.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A value read back from the store with its revision stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    /// Bumped by the store on every write to the key.
    pub revision: u64,
}

/// External fast key-value store with per-key TTL.
///
/// Keys that are absent or expired read as `None`; that is never an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Writes only if the key's current revision equals `expected`
    /// (`None` meaning "key must be absent"). Returns the new revision, or
    /// `None` when the write lost the race.
    async fn put_if_revision(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        expected: Option<u64>,
    ) -> Result<Option<u64>>;
}
