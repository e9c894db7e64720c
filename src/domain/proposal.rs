//! Proposal record and its lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit code of the research office, which holds proposals during school
/// level selection, acceptance and while paused.
pub const RESEARCH_OFFICE_UNIT: &str = "RESEARCH_OFFICE";

/// Lifecycle state of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalState {
    /// Being written by the owner (initial)
    Draft,

    /// Waiting on the owner's faculty
    FacultyReview,

    /// Research office picks proposals and assigns a council
    SchoolSelectionReview,

    /// Reviewing council evaluates the outline
    OutlineCouncilReview,

    /// Outline approved, work not started
    Approved,

    /// Research under way
    InProgress,

    /// Faculty checks the finished work
    FacultyAcceptanceReview,

    /// School checks the finished work
    SchoolAcceptanceReview,

    /// Accepted, awaiting handover
    Completed,

    /// Results handed over (terminal)
    Handover,

    /// Sent back to the owner for revision
    ChangesRequested,

    /// Rejected by a reviewer (terminal)
    Rejected,

    /// Frozen by the research office
    Paused,

    /// Cancelled by the owner before submission (terminal)
    Cancelled,

    /// Withdrawn by the owner during review (terminal)
    Withdrawn,
}

impl ProposalState {
    pub const ALL: [ProposalState; 15] = [
        Self::Draft,
        Self::FacultyReview,
        Self::SchoolSelectionReview,
        Self::OutlineCouncilReview,
        Self::Approved,
        Self::InProgress,
        Self::FacultyAcceptanceReview,
        Self::SchoolAcceptanceReview,
        Self::Completed,
        Self::Handover,
        Self::ChangesRequested,
        Self::Rejected,
        Self::Paused,
        Self::Cancelled,
        Self::Withdrawn,
    ];

    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Cancelled | Self::Handover | Self::Withdrawn
        )
    }

    /// States the owner may still withdraw from
    pub fn is_pre_approval_review(self) -> bool {
        matches!(
            self,
            Self::FacultyReview
                | Self::SchoolSelectionReview
                | Self::OutlineCouncilReview
                | Self::ChangesRequested
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::FacultyReview => "FACULTY_REVIEW",
            Self::SchoolSelectionReview => "SCHOOL_SELECTION_REVIEW",
            Self::OutlineCouncilReview => "OUTLINE_COUNCIL_REVIEW",
            Self::Approved => "APPROVED",
            Self::InProgress => "IN_PROGRESS",
            Self::FacultyAcceptanceReview => "FACULTY_ACCEPTANCE_REVIEW",
            Self::SchoolAcceptanceReview => "SCHOOL_ACCEPTANCE_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Handover => "HANDOVER",
            Self::ChangesRequested => "CHANGES_REQUESTED",
            Self::Rejected => "REJECTED",
            Self::Paused => "PAUSED",
            Self::Cancelled => "CANCELLED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown proposal state: {}", s))
    }
}

/// A research proposal moving through the approval pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,

    /// Human-readable code, e.g. "DT-2026-001"
    pub code: String,

    pub title: String,

    pub state: ProposalState,

    pub owner_id: String,

    pub faculty_id: String,

    pub council_id: Option<String>,

    /// Unit that must act next
    pub holder_unit: Option<String>,

    /// Specific user that must act next, when one is designated
    pub holder_user: Option<String>,

    pub sla_started_at: Option<DateTime<Utc>>,

    pub sla_deadline: Option<DateTime<Utc>>,

    /// Set only while paused
    pub pre_pause_state: Option<ProposalState>,

    pub pre_pause_holder_unit: Option<String>,

    pub pre_pause_holder_user: Option<String>,

    pub paused_at: Option<DateTime<Utc>>,

    pub expected_resume_at: Option<NaiveDate>,

    /// Review state a RETURN came from; RESUBMIT goes back there
    pub return_target_state: Option<ProposalState>,

    /// Optimistic concurrency revision, bumped on every commit
    pub version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Create a new draft owned by `owner_id`
    pub fn new_draft(
        code: impl Into<String>,
        title: impl Into<String>,
        owner_id: impl Into<String>,
        faculty_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let owner_id = owner_id.into();
        let faculty_id = faculty_id.into();

        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            title: title.into(),
            state: ProposalState::Draft,
            holder_unit: Some(faculty_id.clone()),
            holder_user: Some(owner_id.clone()),
            owner_id,
            faculty_id,
            council_id: None,
            sla_started_at: None,
            sla_deadline: None,
            pre_pause_state: None,
            pre_pause_holder_unit: None,
            pre_pause_holder_user: None,
            paused_at: None,
            expected_resume_at: None,
            return_target_state: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state == ProposalState::Paused
    }

    /// Check the record-level invariants
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_paused() != self.pre_pause_state.is_some() {
            return Err(format!(
                "proposal {}: pre_pause_state must be set iff paused (state {})",
                self.code, self.state
            ));
        }

        if !self.state.is_terminal()
            && !self.is_paused()
            && self.holder_unit.is_none()
            && self.holder_user.is_none()
        {
            return Err(format!(
                "proposal {}: no holder assigned in state {}",
                self.code, self.state
            ));
        }

        Ok(())
    }
}
