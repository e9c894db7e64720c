//! Council assignment resolution.
//!
//! Validates a council selection against the loaded council and the
//! proposal, and returns the holder change. Nothing is persisted here.

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use crate::domain::{
    Council, CouncilMemberRole, CouncilSelection, Proposal, ProposalState, WorkflowAction,
};

/// Validated council attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilAssignment {
    pub council_id: String,
    pub secretary_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,

    /// Set on CHANGE_COUNCIL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_council_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CouncilAssignment {
    /// New holder: the council unit and its secretary
    pub fn holder(&self) -> (String, String) {
        (self.council_id.clone(), self.secretary_id.clone())
    }
}

/// Validate an ASSIGN_COUNCIL selection
pub fn resolve_assignment(
    proposal: &Proposal,
    council: Option<&Council>,
    selection: &CouncilSelection,
) -> Result<CouncilAssignment, WorkflowError> {
    if proposal.state != ProposalState::SchoolSelectionReview {
        return Err(WorkflowError::InvalidTransition {
            state: proposal.state,
            action: WorkflowAction::AssignCouncil,
        });
    }

    let council = check_council(proposal, council, selection)?;

    Ok(CouncilAssignment {
        council_id: council.id.clone(),
        secretary_id: selection.secretary_id.clone(),
        member_ids: selection.member_ids.clone(),
        previous_council_id: None,
        reason: None,
    })
}

/// Validate a CHANGE_COUNCIL selection; the new council must differ from
/// the one currently assigned
pub fn resolve_change(
    proposal: &Proposal,
    council: Option<&Council>,
    selection: &CouncilSelection,
    reason: Option<&str>,
) -> Result<CouncilAssignment, WorkflowError> {
    if proposal.state != ProposalState::OutlineCouncilReview {
        return Err(WorkflowError::InvalidTransition {
            state: proposal.state,
            action: WorkflowAction::ChangeCouncil,
        });
    }

    let previous = proposal.council_id.as_deref().ok_or_else(|| {
        WorkflowError::validation(
            "council",
            format!("NO_COUNCIL_ASSIGNED: proposal {} has no council to change", proposal.code),
        )
    })?;

    if previous == selection.council_id {
        return Err(WorkflowError::validation(
            "council.council_id",
            format!("SAME_COUNCIL: {} is already assigned", previous),
        ));
    }

    let council = check_council(proposal, council, selection)?;

    Ok(CouncilAssignment {
        council_id: council.id.clone(),
        secretary_id: selection.secretary_id.clone(),
        member_ids: selection.member_ids.clone(),
        previous_council_id: Some(previous.to_string()),
        reason: reason.map(str::to_string),
    })
}

fn check_council<'a>(
    proposal: &Proposal,
    council: Option<&'a Council>,
    selection: &CouncilSelection,
) -> Result<&'a Council, WorkflowError> {
    let council = council
        .filter(|c| c.id == selection.council_id)
        .ok_or_else(|| WorkflowError::not_found("council", &selection.council_id))?;

    let secretaries: Vec<_> = council.secretaries().collect();
    if secretaries.len() != 1 {
        return Err(WorkflowError::validation(
            "council",
            format!(
                "council {} must have exactly one secretary, found {}",
                council.id,
                secretaries.len()
            ),
        ));
    }

    if !council
        .members
        .iter()
        .any(|m| m.role != CouncilMemberRole::Secretary)
    {
        return Err(WorkflowError::validation(
            "council",
            format!("council {} has no members besides its secretary", council.id),
        ));
    }

    let secretary = secretaries[0];
    let declared_matches = council
        .secretary_id
        .as_deref()
        .map_or(true, |declared| declared == secretary.user_id);

    if secretary.user_id != selection.secretary_id || !declared_matches {
        return Err(WorkflowError::validation(
            "council.secretary_id",
            format!(
                "SECRETARY_NOT_FOUND: {} is not the secretary of council {}",
                selection.secretary_id, council.id
            ),
        ));
    }

    if let Some(outsider) = selection.member_ids.iter().find(|id| !council.has_member(id)) {
        return Err(WorkflowError::validation(
            "council.member_ids",
            format!("{} is not a member of council {}", outsider, council.id),
        ));
    }

    // The owner never reviews their own proposal
    if selection.secretary_id == proposal.owner_id
        || selection.member_ids.iter().any(|id| *id == proposal.owner_id)
    {
        return Err(WorkflowError::validation(
            "council",
            format!(
                "OWNER_IN_COUNCIL: {} owns proposal {} and cannot sit on its council",
                proposal.owner_id, proposal.code
            ),
        ));
    }

    Ok(council)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CouncilMember, CouncilType};
    use chrono::Utc;

    fn member(id: &str, role: CouncilMemberRole) -> CouncilMember {
        CouncilMember {
            user_id: id.to_string(),
            display_name: id.to_string(),
            role,
        }
    }

    fn council(id: &str) -> Council {
        Council {
            id: id.to_string(),
            name: format!("Council {}", id),
            council_type: CouncilType::Outline,
            secretary_id: Some(format!("{}-sec", id)),
            members: vec![
                member(&format!("{}-chair", id), CouncilMemberRole::Chair),
                member(&format!("{}-sec", id), CouncilMemberRole::Secretary),
                member(&format!("{}-m1", id), CouncilMemberRole::Member),
            ],
        }
    }

    fn selection(id: &str) -> CouncilSelection {
        CouncilSelection {
            council_id: id.to_string(),
            secretary_id: format!("{}-sec", id),
            member_ids: vec![],
        }
    }

    fn proposal_in(state: ProposalState) -> Proposal {
        let mut p = Proposal::new_draft("DT-1", "t", "owner", "fac", Utc::now());
        p.state = state;
        p
    }

    #[test]
    fn test_assign_valid_council() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let c = council("c1");
        let assignment = resolve_assignment(&p, Some(&c), &selection("c1")).unwrap();
        assert_eq!(assignment.holder(), ("c1".to_string(), "c1-sec".to_string()));
        assert!(assignment.previous_council_id.is_none());
    }

    #[test]
    fn test_missing_council_is_not_found() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let err = resolve_assignment(&p, None, &selection("c9")).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_wrong_secretary_rejected() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let c = council("c1");
        let mut sel = selection("c1");
        sel.secretary_id = "c1-m1".into();
        let err = resolve_assignment(&p, Some(&c), &sel).unwrap_err();
        assert!(err.to_string().contains("SECRETARY_NOT_FOUND"));
    }

    #[test]
    fn test_two_secretaries_rejected() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let mut c = council("c1");
        c.members.push(member("extra", CouncilMemberRole::Secretary));
        assert!(resolve_assignment(&p, Some(&c), &selection("c1")).is_err());
    }

    #[test]
    fn test_members_must_be_subset() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let c = council("c1");
        let mut sel = selection("c1");
        sel.member_ids = vec!["c1-m1".into(), "stranger".into()];
        let err = resolve_assignment(&p, Some(&c), &sel).unwrap_err();
        assert!(err.to_string().contains("stranger"));
    }

    #[test]
    fn test_secretary_alone_is_not_a_council() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);
        let mut c = council("solo");
        c.members.retain(|m| m.role == CouncilMemberRole::Secretary);

        let err = resolve_assignment(&p, Some(&c), &selection("solo")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("besides its secretary"));
    }

    #[test]
    fn test_owner_cannot_review_own_proposal() {
        let p = proposal_in(ProposalState::SchoolSelectionReview);

        // Owner as the secretary
        let mut c = council("c1");
        c.secretary_id = Some("owner".into());
        c.members[1].user_id = "owner".into();
        let mut sel = selection("c1");
        sel.secretary_id = "owner".into();
        let err = resolve_assignment(&p, Some(&c), &sel).unwrap_err();
        assert!(err.to_string().contains("OWNER_IN_COUNCIL"));

        // Owner among the selected members
        let mut c = council("c2");
        c.members.push(member("owner", CouncilMemberRole::Member));
        let mut sel = selection("c2");
        sel.member_ids = vec!["c2-m1".into(), "owner".into()];
        let err = resolve_assignment(&p, Some(&c), &sel).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("OWNER_IN_COUNCIL"));
    }

    #[test]
    fn test_assign_in_wrong_state() {
        let p = proposal_in(ProposalState::FacultyReview);
        let c = council("c1");
        let err = resolve_assignment(&p, Some(&c), &selection("c1")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_change_requires_current_and_different_council() {
        let mut p = proposal_in(ProposalState::OutlineCouncilReview);
        let c1 = council("c1");
        let c2 = council("c2");

        let err = resolve_change(&p, Some(&c2), &selection("c2"), None).unwrap_err();
        assert!(err.to_string().contains("NO_COUNCIL_ASSIGNED"));

        p.council_id = Some("c1".into());
        let err = resolve_change(&p, Some(&c1), &selection("c1"), None).unwrap_err();
        assert!(err.to_string().contains("SAME_COUNCIL"));

        let change = resolve_change(&p, Some(&c2), &selection("c2"), Some("conflict of interest")).unwrap();
        assert_eq!(change.previous_council_id.as_deref(), Some("c1"));
        assert_eq!(change.reason.as_deref(), Some("conflict of interest"));
    }
}
