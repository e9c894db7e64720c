//! Remembered outcomes of idempotent requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    InProgress,
    Completed,
    Failed,
}

impl IdempotencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdempotencyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown idempotency status: {}", other)),
        }
    }
}

/// One (scope, key) slot.
///
/// Moves IN_PROGRESS -> COMPLETED or IN_PROGRESS -> FAILED exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// e.g. "workflow:SUBMIT"
    pub scope: String,

    pub key: String,

    /// SHA-256 hex of the canonical request
    pub fingerprint: String,

    pub status: IdempotencyStatus,

    /// Serialized success value (COMPLETED) or error body (FAILED)
    pub result: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn in_progress(
        scope: impl Into<String>,
        key: impl Into<String>,
        fingerprint: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
            fingerprint: fingerprint.into(),
            status: IdempotencyStatus::InProgress,
            result: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
