//! Workflow actions, actor roles and the inbound action request.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role claim attached to an actor by the upstream identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Proposal owner
    Lecturer,
    FacultyManager,
    FacultySecretary,
    /// Managing office for school-level review
    ResearchOffice,
    CouncilSecretary,
    RectorBoard,
    /// System administration only, carries no workflow permissions
    Admin,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Self::Lecturer,
        Self::FacultyManager,
        Self::FacultySecretary,
        Self::ResearchOffice,
        Self::CouncilSecretary,
        Self::RectorBoard,
        Self::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lecturer => "LECTURER",
            Self::FacultyManager => "FACULTY_MANAGER",
            Self::FacultySecretary => "FACULTY_SECRETARY",
            Self::ResearchOffice => "RESEARCH_OFFICE",
            Self::CouncilSecretary => "COUNCIL_SECRETARY",
            Self::RectorBoard => "RECTOR_BOARD",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// A state-changing action a client may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Return,
    Reject,
    Resubmit,
    AssignCouncil,
    ChangeCouncil,
    StartProject,
    SubmitAcceptance,
    FacultyAccept,
    Accept,
    Handover,
    Pause,
    Resume,
    Cancel,
    Withdraw,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 16] = [
        Self::Submit,
        Self::Approve,
        Self::Return,
        Self::Reject,
        Self::Resubmit,
        Self::AssignCouncil,
        Self::ChangeCouncil,
        Self::StartProject,
        Self::SubmitAcceptance,
        Self::FacultyAccept,
        Self::Accept,
        Self::Handover,
        Self::Pause,
        Self::Resume,
        Self::Cancel,
        Self::Withdraw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "SUBMIT",
            Self::Approve => "APPROVE",
            Self::Return => "RETURN",
            Self::Reject => "REJECT",
            Self::Resubmit => "RESUBMIT",
            Self::AssignCouncil => "ASSIGN_COUNCIL",
            Self::ChangeCouncil => "CHANGE_COUNCIL",
            Self::StartProject => "START_PROJECT",
            Self::SubmitAcceptance => "SUBMIT_ACCEPTANCE",
            Self::FacultyAccept => "FACULTY_ACCEPT",
            Self::Accept => "ACCEPT",
            Self::Handover => "HANDOVER",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Cancel => "CANCEL",
            Self::Withdraw => "WITHDRAW",
        }
    }

    /// Actions that must carry a reason text
    pub fn requires_reason(self) -> bool {
        matches!(
            self,
            Self::Return | Self::Reject | Self::Withdraw | Self::Pause
        )
    }

    /// Actions that attach a council to the proposal
    pub fn is_council_action(self) -> bool {
        matches!(self, Self::AssignCouncil | Self::ChangeCouncil)
    }

    /// Idempotency scope for this action
    pub fn scope(self) -> String {
        format!("workflow:{}", self.as_str())
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown workflow action: {}", s))
    }
}

/// Verified identity of the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role,
        }
    }
}

/// Council chosen by the research office for ASSIGN_COUNCIL / CHANGE_COUNCIL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilSelection {
    pub council_id: String,

    /// Must be the council's secretary member
    pub secretary_id: String,

    /// Optional subset of council members taking part in this review
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
}

/// Action-specific inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council: Option<CouncilSelection>,

    /// PAUSE only: operator's guess at when work resumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_resume_at: Option<NaiveDate>,
}

impl ActionPayload {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_council(selection: CouncilSelection) -> Self {
        Self {
            council: Some(selection),
            ..Self::default()
        }
    }
}

/// Inbound request to perform one workflow action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub proposal_id: Uuid,
    pub action: WorkflowAction,

    /// Client-generated UUIDv4, reused on retries
    pub idempotency_key: String,

    #[serde(default)]
    pub payload: ActionPayload,
}

impl ActionRequest {
    pub fn new(proposal_id: Uuid, action: WorkflowAction, idempotency_key: impl Into<String>) -> Self {
        Self {
            proposal_id,
            action,
            idempotency_key: idempotency_key.into(),
            payload: ActionPayload::default(),
        }
    }

    pub fn with_payload(mut self, payload: ActionPayload) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parses_cli_spelling() {
        assert_eq!(
            "assign-council".parse::<WorkflowAction>().unwrap(),
            WorkflowAction::AssignCouncil
        );
        assert_eq!("resume".parse::<WorkflowAction>().unwrap(), WorkflowAction::Resume);
        assert!("teleport".parse::<WorkflowAction>().is_err());
    }

    #[test]
    fn test_scope_prefix() {
        assert_eq!(WorkflowAction::Cancel.scope(), "workflow:CANCEL");
    }

    #[test]
    fn test_empty_payload_serializes_compactly() {
        let json = serde_json::to_string(&ActionPayload::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
