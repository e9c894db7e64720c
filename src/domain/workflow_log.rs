//! Immutable audit trail of applied transitions.
//!
//! One entry is written for every successful transition, in the same
//! transaction as the proposal update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::{Actor, WorkflowAction};
use super::proposal::ProposalState;

/// A single applied transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    /// Unique identifier for this entry
    pub id: Uuid,

    /// Proposal the transition applied to
    pub proposal_id: Uuid,

    pub action: WorkflowAction,

    pub actor_id: String,

    /// Display name at the time of the action
    pub actor_name: String,

    pub previous_state: ProposalState,

    pub new_state: ProposalState,

    pub timestamp: DateTime<Utc>,

    pub comment: Option<String>,

    pub reason: Option<String>,

    /// Action-specific details (council change, pause expectations)
    pub metadata: Option<serde_json::Value>,
}

impl WorkflowLogEntry {
    pub fn new(
        proposal_id: Uuid,
        action: WorkflowAction,
        actor: &Actor,
        previous_state: ProposalState,
        new_state: ProposalState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            proposal_id,
            action,
            actor_id: actor.id.clone(),
            actor_name: actor.display_name.clone(),
            previous_state,
            new_state,
            timestamp,
            comment: None,
            reason: None,
            metadata: None,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
