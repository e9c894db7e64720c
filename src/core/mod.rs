//! Core workflow logic.
//!
//! This module contains:
//! - StateMachine: Declarative transition table and SLA policy
//! - Council: Council assignment resolution
//! - Idempotency: At-most-once execution per idempotency key
//! - Orchestrator: Main entry point tying the pieces to the stores
//! - Error: Wire error codes and the response envelope

pub mod clock;
pub mod council;
pub mod deadline;
pub mod error;
pub mod idempotency;
pub mod orchestrator;
pub mod settings;
pub mod state_machine;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use council::{resolve_assignment, resolve_change, CouncilAssignment};
pub use deadline::with_deadline;
pub use error::{ActionResponse, ErrorBody, WorkflowError};
pub use idempotency::{fingerprint, Executed, IdempotencyCache};
pub use orchestrator::{ActionOutcome, ActionResult, WorkflowOrchestrator};
pub use settings::{
    IdempotencySettings, SlaBudgets, SlaSettings, TimeoutSettings, ValidationSettings,
    WorkflowSettings,
};
pub use state_machine::{
    available_actions, can_perform, role_may_perform, transition, Transition, TransitionContext,
    TransitionOutcome,
};
pub use validation::{validate_idempotency_key, validate_payload};
