//! Scoped operations with a time limit.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::WorkflowError;

/// Race `fut` against a timer; expiry maps to `TIMEOUT`.
///
/// The losing future is dropped, so nothing it started past an await point
/// keeps running. Never wrap a commit in this.
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, WorkflowError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let limit_ms = limit.as_millis() as u64;
            warn!(operation, limit_ms, "operation timed out");
            Err(WorkflowError::Timeout {
                operation: operation.to_string(),
                limit_ms,
            })
        }
    }
}
