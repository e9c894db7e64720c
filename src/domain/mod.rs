//! Domain types for the propflow workflow engine.
//!
//! This module contains the core data structures:
//! - Proposal: The tracked document and its lifecycle state
//! - Action: Requested actions, actor roles and payloads
//! - WorkflowLogEntry: Immutable record of an applied transition
//! - Council: Reviewing councils and their members
//! - IdempotencyRecord: Remembered outcome of an idempotent request

pub mod action;
pub mod council;
pub mod idempotency;
pub mod proposal;
pub mod workflow_log;

// Re-export commonly used types
pub use action::{ActionPayload, ActionRequest, Actor, CouncilSelection, Role, WorkflowAction};
pub use council::{Council, CouncilMember, CouncilMemberRole, CouncilType};
pub use idempotency::{IdempotencyRecord, IdempotencyStatus};
pub use proposal::{Proposal, ProposalState, RESEARCH_OFFICE_UNIT};
pub use workflow_log::WorkflowLogEntry;
