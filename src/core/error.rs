//! Error taxonomy for workflow actions.
//!
//! Every rejected action maps to exactly one code. Errors serialize with a
//! `code` tag so a FAILED idempotency record replays the identical body.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ProposalState, Role, WorkflowAction};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowError {
    #[error("cannot {action} a proposal in state {state}")]
    InvalidTransition {
        state: ProposalState,
        action: WorkflowAction,
    },

    #[error("{role} is not allowed to {action}: {message}")]
    ForbiddenTransition {
        role: Role,
        action: WorkflowAction,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("idempotency key {key} was already used for a different request")]
    IdempotencyKeyReuse { key: String },

    #[error("a request with idempotency key {key} is still in progress")]
    OperationInProgress { key: String },

    #[error("proposal {proposal_id} was modified concurrently, reload and retry")]
    ConcurrentModification { proposal_id: Uuid },

    #[serde(rename = "VALIDATION_ERROR")]
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{operation} exceeded {limit_ms}ms")]
    Timeout { operation: String, limit_ms: u64 },

    #[serde(rename = "STORAGE_ERROR")]
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl WorkflowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn forbidden(role: Role, action: WorkflowAction, message: impl Into<String>) -> Self {
        Self::ForbiddenTransition {
            role,
            action,
            message: message.into(),
        }
    }

    /// Stable wire code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ForbiddenTransition { .. } => "FORBIDDEN_TRANSITION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::IdempotencyKeyReuse { .. } => "IDEMPOTENCY_KEY_REUSE",
            Self::OperationInProgress { .. } => "OPERATION_IN_PROGRESS",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Whether the client may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OperationInProgress { .. }
                | Self::ConcurrentModification { .. }
                | Self::Timeout { .. }
                | Self::Storage { .. }
        )
    }

    /// Whether an idempotency record should be released instead of
    /// remembering this failure
    pub fn releases_idempotency_record(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::Timeout { .. } | Self::Storage { .. }
        )
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { proposal_id, .. } => {
                Self::ConcurrentModification { proposal_id }
            }
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Error part of the response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&WorkflowError> for ErrorBody {
    fn from(err: &WorkflowError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// `{ success, data }` / `{ success, error }` envelope returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(err: &WorkflowError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
        }
    }
}

impl<T> From<Result<T, WorkflowError>> for ActionResponse<T> {
    fn from(result: Result<T, WorkflowError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(&err),
        }
    }
}
