//! Persistence ports for the workflow engine.
//!
//! Two traits cover everything the orchestrator needs from storage:
//! - WorkflowStore: proposals, the workflow log, councils and calendar entries
//! - IdempotencyStore: atomic claim / complete / release of request slots
//!
//! Adapters:
//! - MemoryStore: process-local maps behind a tokio mutex
//! - SqliteStore: rusqlite connection driven from blocking tasks

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::CalendarEntry;
use crate::domain::{
    Council, IdempotencyRecord, IdempotencyStatus, Proposal, WorkflowAction, WorkflowLogEntry,
};

// Re-export the adapters
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("proposal {proposal_id} is not at version {expected}")]
    VersionConflict { proposal_id: Uuid, expected: i64 },

    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error("{entity} not found: {id}")]
    Missing { entity: &'static str, id: String },

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Idempotency slot to mark COMPLETED together with a transition
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCompletion {
    pub scope: String,
    pub key: String,
    pub result: serde_json::Value,
}

/// Proposal update plus its log entry, applied atomically
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// New proposal row, already carrying `expected_version + 1`
    pub proposal: Proposal,

    /// Version the transition was computed against
    pub expected_version: i64,

    pub log: WorkflowLogEntry,

    /// IN_PROGRESS record in the same store to complete in the same step.
    /// Ignored when the store holds no such record.
    pub completion: Option<SlotCompletion>,
}

impl TransitionCommit {
    pub fn new(mut proposal: Proposal, log: WorkflowLogEntry) -> Self {
        let expected_version = proposal.version;
        proposal.version = expected_version + 1;
        Self {
            proposal,
            expected_version,
            log,
            completion: None,
        }
    }

    pub fn with_completion(mut self, completion: SlotCompletion) -> Self {
        self.completion = Some(completion);
        self
    }
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError>;

    async fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError>;

    /// Update the proposal iff its stored version equals
    /// `commit.expected_version`, and append the log entry, in one
    /// transaction. A lost race fails with `VersionConflict`. When the
    /// commit carries a `completion`, the matching IN_PROGRESS idempotency
    /// record is completed inside the same transaction.
    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<(), StoreError>;

    /// Log entries for a proposal, oldest first
    async fn workflow_log(&self, proposal_id: Uuid) -> Result<Vec<WorkflowLogEntry>, StoreError>;

    /// Most recent entry for `action` on a proposal
    async fn last_log_for(
        &self,
        proposal_id: Uuid,
        action: WorkflowAction,
    ) -> Result<Option<WorkflowLogEntry>, StoreError>;

    async fn upsert_council(&self, council: &Council) -> Result<(), StoreError>;

    async fn get_council(&self, id: &str) -> Result<Option<Council>, StoreError>;

    /// Snapshot of every calendar entry
    async fn calendar_entries(&self) -> Result<Vec<CalendarEntry>, StoreError>;

    async fn upsert_calendar_entry(&self, entry: &CalendarEntry) -> Result<(), StoreError>;

    async fn remove_calendar_entry(&self, date: NaiveDate) -> Result<bool, StoreError>;
}

/// Result of trying to claim an idempotency slot
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The slot was free (or expired) and now holds the caller's IN_PROGRESS record
    Acquired,
    /// A live record already occupies the slot
    Existing(IdempotencyRecord),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Insert `record` unless a live record holds (scope, key). Expired
    /// records are evicted as part of the same atomic step.
    async fn try_claim(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> Result<Claim, StoreError>;

    /// Live record holding (scope, key), without claiming it
    async fn lookup(
        &self,
        scope: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Move an IN_PROGRESS record to its final status. A record already
    /// holding `status` is left as it is.
    async fn finish(
        &self,
        scope: &str,
        key: &str,
        status: IdempotencyStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Drop an IN_PROGRESS record so the request may run again
    async fn release(&self, scope: &str, key: &str) -> Result<(), StoreError>;

    /// Delete every record that expired at or before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
