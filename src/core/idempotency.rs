//! Idempotency cache for state-changing requests.
//!
//! A (scope, key) slot is claimed atomically before the operation runs:
//! - Free slot: run the operation, then remember its result or error
//! - Finished slot, same fingerprint: return the remembered outcome unchanged
//! - Any slot with a different fingerprint: IDEMPOTENCY_KEY_REUSE
//! - Slot still in progress: OPERATION_IN_PROGRESS, the client retries later
//!
//! Retryable failures (conflict, timeout, storage) release the slot instead
//! of remembering the failure.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use super::error::WorkflowError;
use crate::domain::{IdempotencyRecord, IdempotencyStatus};
use crate::store::{Claim, IdempotencyStore};

const FINISH_ATTEMPTS: u32 = 3;
const FINISH_BACKOFF: std::time::Duration = std::time::Duration::from_millis(20);

/// SHA-256 hex over the canonical JSON form of `request`.
///
/// `serde_json::Value` keeps object keys sorted, so field order in the
/// source type does not change the fingerprint.
pub fn fingerprint<T: Serialize>(request: &T) -> Result<String, WorkflowError> {
    let canonical = serde_json::to_value(request)
        .and_then(|v| serde_json::to_string(&v))
        .map_err(|e| WorkflowError::Storage {
            message: format!("failed to encode request: {}", e),
        })?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Value produced by `execute`
#[derive(Debug, Clone, PartialEq)]
pub struct Executed<T> {
    pub value: T,

    /// True when the value came from an earlier identical request
    pub replayed: bool,
}

pub struct IdempotencyCache {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl_hours: i64) -> Self {
        Self {
            store,
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    /// Run `operation` at most once per (scope, key)
    pub async fn execute<T, F, Fut>(
        &self,
        scope: &str,
        key: &str,
        request_fingerprint: &str,
        now: DateTime<Utc>,
        operation: F,
    ) -> Result<Executed<T>, WorkflowError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        let claim = IdempotencyRecord::in_progress(scope, key, request_fingerprint, now, self.ttl);

        if let Claim::Existing(existing) = self.store.try_claim(&claim, now).await? {
            return replay(existing, request_fingerprint);
        }

        debug!(scope, key, "claimed idempotency slot");

        match operation().await {
            Ok(value) => {
                match serde_json::to_value(&value) {
                    Ok(body) => self.record(scope, key, IdempotencyStatus::Completed, &body).await,
                    Err(e) => error!(scope, key, error = %e, "failed to encode result"),
                }
                Ok(Executed {
                    value,
                    replayed: false,
                })
            }
            Err(err) if err.releases_idempotency_record() => {
                warn!(scope, key, code = err.code(), "releasing idempotency slot after retryable failure");
                if let Err(e) = self.store.release(scope, key).await {
                    error!(scope, key, error = %e, "failed to release idempotency slot");
                }
                Err(err)
            }
            Err(err) => {
                match serde_json::to_value(&err) {
                    Ok(body) => self.record(scope, key, IdempotencyStatus::Failed, &body).await,
                    Err(e) => error!(scope, key, error = %e, "failed to encode error"),
                }
                Err(err)
            }
        }
    }

    /// Fail with IDEMPOTENCY_KEY_REUSE when a live record holds the slot
    /// for a different request. Claims nothing.
    pub async fn reject_reuse(
        &self,
        scope: &str,
        key: &str,
        request_fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        match self.store.lookup(scope, key, now).await? {
            Some(existing) if existing.fingerprint != request_fingerprint => {
                warn!(scope, key, "idempotency key reused with a different request");
                Err(WorkflowError::IdempotencyKeyReuse { key: existing.key })
            }
            _ => Ok(()),
        }
    }

    /// Store the final outcome, retrying transient store failures. The
    /// operation has already taken effect, so a lost write leaves the slot
    /// IN_PROGRESS until it expires and is logged as an error.
    async fn record(&self, scope: &str, key: &str, status: IdempotencyStatus, body: &serde_json::Value) {
        for attempt in 1..=FINISH_ATTEMPTS {
            match self.store.finish(scope, key, status, body).await {
                Ok(()) => return,
                Err(e) if attempt < FINISH_ATTEMPTS => {
                    warn!(scope, key, attempt, error = %e, "retrying idempotency record update");
                    tokio::time::sleep(FINISH_BACKOFF * attempt).await;
                }
                Err(e) => error!(scope, key, %status, error = %e, "failed to record outcome"),
            }
        }
    }

    /// Remove every expired record
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let removed = self.store.purge_expired(now).await?;
        if removed > 0 {
            info!(removed, "purged expired idempotency records");
        }
        Ok(removed)
    }
}

fn replay<T: DeserializeOwned>(
    existing: IdempotencyRecord,
    request_fingerprint: &str,
) -> Result<Executed<T>, WorkflowError> {
    if existing.fingerprint != request_fingerprint {
        warn!(scope = %existing.scope, key = %existing.key, "idempotency key reused with a different request");
        return Err(WorkflowError::IdempotencyKeyReuse { key: existing.key });
    }

    let stored = || {
        existing.result.clone().ok_or_else(|| WorkflowError::Storage {
            message: format!("idempotency record {} has no stored outcome", existing.key),
        })
    };

    match existing.status {
        IdempotencyStatus::InProgress => Err(WorkflowError::OperationInProgress {
            key: existing.key.clone(),
        }),
        IdempotencyStatus::Completed => {
            let value = serde_json::from_value(stored()?).map_err(|e| WorkflowError::Storage {
                message: format!("stored result is unreadable: {}", e),
            })?;
            debug!(key = %existing.key, "replaying completed request");
            Ok(Executed {
                value,
                replayed: true,
            })
        }
        IdempotencyStatus::Failed => {
            let err: WorkflowError = serde_json::from_value(stored()?).map_err(|e| WorkflowError::Storage {
                message: format!("stored error is unreadable: {}", e),
            })?;
            debug!(key = %existing.key, code = err.code(), "replaying failed request");
            Err(err)
        }
    }
}
