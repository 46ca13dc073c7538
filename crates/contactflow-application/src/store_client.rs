//! Session Store Client.
//!
//! Typed access to the external key-value store: key prefixing, JSON
//! encoding, TTL derivation and the configured write policy. Every store
//! call runs under the external-call timeout.

use crate::external::with_timeout;
use chrono::Utc;
use contactflow_core::batch::Batch;
use contactflow_core::config::{OrchestratorConfig, WritePolicy};
use contactflow_core::session::{Session, SessionStore};
use contactflow_core::{FlowError, Result};
use std::sync::Arc;
use std::time::Duration;

/// A session together with the store revision it was read at.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: Session,
    /// `None` until the session has been written once.
    revision: Option<u64>,
}

impl StoredSession {
    /// Wraps a session that is not in the store yet.
    pub fn fresh(session: Session) -> Self {
        Self {
            session,
            revision: None,
        }
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }
}

pub struct SessionStoreClient {
    store: Arc<dyn SessionStore>,
    session_prefix: String,
    batch_prefix: String,
    batch_ttl: Duration,
    write_policy: WritePolicy,
    call_timeout: Duration,
}

impl SessionStoreClient {
    pub fn new(store: Arc<dyn SessionStore>, config: &OrchestratorConfig) -> Self {
        Self {
            store,
            session_prefix: config.session_key_prefix.clone(),
            batch_prefix: config.batch_key_prefix.clone(),
            batch_ttl: Duration::from_secs(config.batch_retention_ttl_secs),
            write_policy: config.write_policy,
            call_timeout: config.external_call_timeout(),
        }
    }

    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}{}", self.session_prefix, session_id)
    }

    pub fn batch_key(&self, batch_id: &str) -> String {
        format!("{}{}", self.batch_prefix, batch_id)
    }

    /// Absent or expired sessions read as `None`.
    pub async fn load(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let key = self.session_key(session_id);
        let raw = with_timeout(self.call_timeout, "session store get", self.store.get(&key)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw.value)?;
        Ok(Some(StoredSession {
            session,
            revision: Some(raw.revision),
        }))
    }

    /// Like [`load`](Self::load), but absence is `SessionNotFound`.
    pub async fn require(&self, session_id: &str) -> Result<StoredSession> {
        self.load(session_id)
            .await?
            .ok_or_else(|| FlowError::session_not_found(session_id))
    }

    /// Writes the session with a TTL of whatever is left until `expires_at`.
    ///
    /// Under compare-and-swap the write only lands if nobody wrote the key
    /// since it was read; otherwise it fails with `Conflict`.
    pub async fn save(&self, stored: &mut StoredSession) -> Result<()> {
        let session = &stored.session;
        let key = self.session_key(&session.session_id);
        let ttl = Duration::from_secs(session.remaining_ttl_secs(Utc::now()));
        let body = serde_json::to_string(session)?;

        match self.write_policy {
            WritePolicy::LastWriterWins => {
                with_timeout(self.call_timeout, "session store put", self.store.put(&key, body, ttl)).await?;
            }
            WritePolicy::CompareAndSwap => {
                let written = with_timeout(
                    self.call_timeout,
                    "session store put_if_revision",
                    self.store.put_if_revision(&key, body, ttl, stored.revision),
                )
                .await?;
                match written {
                    Some(revision) => stored.revision = Some(revision),
                    None => {
                        tracing::warn!(session_id = %session.session_id, "Lost compare-and-swap write");
                        return Err(FlowError::conflict(
                            session.session_id.clone(),
                            "session was modified concurrently; reload and retry",
                        ));
                    }
                }
            }
        }
        tracing::debug!(
            session_id = %stored.session.session_id,
            state = %stored.session.state,
            ttl_secs = ttl.as_secs(),
            "Session written"
        );
        Ok(())
    }

    /// Idempotent.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let key = self.session_key(session_id);
        with_timeout(self.call_timeout, "session store delete", self.store.delete(&key)).await
    }

    /// Batch snapshots are written by one coordinator only, so always plain puts.
    pub async fn save_batch(&self, batch: &Batch) -> Result<()> {
        let key = self.batch_key(&batch.batch_id);
        let body = serde_json::to_string(batch)?;
        with_timeout(self.call_timeout, "batch snapshot put", self.store.put(&key, body, self.batch_ttl)).await
    }

    pub async fn load_batch(&self, batch_id: &str) -> Result<Option<Batch>> {
        let key = self.batch_key(batch_id);
        let raw = with_timeout(self.call_timeout, "batch snapshot get", self.store.get(&key)).await?;
        raw.map(|r| serde_json::from_str(&r.value).map_err(FlowError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contactflow_core::contact::ContactPayload;
    use contactflow_core::session::StoredValue;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Minimal store; revisions count writes per key.
    #[derive(Default)]
    struct MockStore {
        data: Mutex<HashMap<String, StoredValue>>,
    }

    #[async_trait]
    impl SessionStore for MockStore {
        async fn put(&self, key: &str, value: String, _ttl: Duration) -> Result<()> {
            let mut data = self.data.lock().await;
            let revision = data.get(key).map_or(1, |v| v.revision + 1);
            data.insert(key.to_string(), StoredValue { value, revision });
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<StoredValue>> {
            Ok(self.data.lock().await.get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().await.remove(key);
            Ok(())
        }

        async fn put_if_revision(
            &self,
            key: &str,
            value: String,
            _ttl: Duration,
            expected: Option<u64>,
        ) -> Result<Option<u64>> {
            let mut data = self.data.lock().await;
            if data.get(key).map(|v| v.revision) != expected {
                return Ok(None);
            }
            let revision = expected.map_or(1, |r| r + 1);
            data.insert(key.to_string(), StoredValue { value, revision });
            Ok(Some(revision))
        }
    }

    /// Never answers.
    struct HangingStore;

    #[async_trait]
    impl SessionStore for HangingStore {
        async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            std::future::pending().await
        }

        async fn get(&self, _key: &str) -> Result<Option<StoredValue>> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            std::future::pending().await
        }

        async fn put_if_revision(
            &self,
            _key: &str,
            _value: String,
            _ttl: Duration,
            _expected: Option<u64>,
        ) -> Result<Option<u64>> {
            std::future::pending().await
        }
    }

    fn session() -> Session {
        Session::new("acct", ContactPayload::default(), 7200, Utc::now())
    }

    #[tokio::test]
    async fn test_roundtrip_and_prefix() {
        let store = Arc::new(MockStore::default());
        let client = SessionStoreClient::new(store.clone(), &OrchestratorConfig::default());
        let mut stored = StoredSession::fresh(session());
        let id = stored.session.session_id.clone();
        client.save(&mut stored).await.unwrap();

        assert!(store.data.lock().await.contains_key(&format!("contact_session:{}", id)));
        let loaded = client.require(&id).await.unwrap();
        assert_eq!(loaded.session, stored.session);

        client.delete(&id).await.unwrap();
        client.delete(&id).await.unwrap();
        assert!(client.load(&id).await.unwrap().is_none());
        assert!(client.require(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_compare_and_swap_conflict() {
        let config = OrchestratorConfig {
            write_policy: WritePolicy::CompareAndSwap,
            ..Default::default()
        };
        let client = SessionStoreClient::new(Arc::new(MockStore::default()), &config);
        let mut stored = StoredSession::fresh(session());
        client.save(&mut stored).await.unwrap();
        let id = stored.session.session_id.clone();

        let mut first = client.require(&id).await.unwrap();
        let mut second = client.require(&id).await.unwrap();
        client.save(&mut first).await.unwrap();
        client.save(&mut first).await.unwrap();
        assert!(client.save(&mut second).await.unwrap_err().is_conflict());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_calls_time_out() {
        let config = OrchestratorConfig {
            external_call_timeout_ms: 50,
            ..Default::default()
        };
        let client = SessionStoreClient::new(Arc::new(HangingStore), &config);
        let err = client.load("sess_x").await.unwrap_err();
        assert!(matches!(err, FlowError::Timeout { elapsed_ms: 50, .. }));
    }
}
