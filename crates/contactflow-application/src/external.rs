use contactflow_core::{FlowError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs an external call under `limit`; elapsing maps to `FlowError::Timeout`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "External call timed out");
            Err(FlowError::timeout(operation, limit.as_millis() as u64))
        }
    }
}
