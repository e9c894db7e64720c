//! propflow - Research-proposal approval workflow engine
//!
//! Moves research proposals through a fixed lifecycle (draft, faculty
//! review, council review, execution, acceptance, handover) on behalf of
//! role-bearing actors.
//!
//! # Architecture
//!
//! - Every transition is a row in a declarative table, checked against the
//!   actor's role and ownership before anything is written
//! - Review deadlines are counted in working days on a business calendar
//!   with holidays and compensatory working days
//! - Every state-changing request carries an idempotency key; a retry
//!   replays the stored result instead of acting twice
//! - Proposal updates and their workflow log entry commit atomically under
//!   an optimistic version check
//!
//! # Modules
//!
//! - `calendar`: Working-day arithmetic
//! - `core`: State machine, council resolver, idempotency, orchestrator
//! - `domain`: Data structures (Proposal, WorkflowAction, Council, ...)
//! - `store`: Persistence ports plus in-memory and SQLite adapters
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a proposal as its owner
//! propflow proposal create --code DT-2026-014 --title "Soil microbiome" \
//!     --faculty FAC-BIO --as u-17 --role lecturer
//!
//! # Submit it (retry with the same --key to replay the result)
//! propflow act <proposal-id> submit --as u-17 --role lecturer
//! ```

pub mod calendar;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use calendar::{BusinessCalendar, CalendarEntry};
pub use core::{ActionOutcome, ActionResponse, WorkflowError, WorkflowOrchestrator};
pub use domain::{ActionPayload, ActionRequest, Actor, Proposal, ProposalState, Role, WorkflowAction};
pub use store::{MemoryStore, SqliteStore};
