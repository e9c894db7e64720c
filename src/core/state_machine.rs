//! Declarative proposal state machine.
//!
//! The transition table is the only place role permissions live. Evaluation
//! order for a request:
//! 1. The actor's role must be allowed to perform the action on some row
//! 2. A row must exist for (current state, action)
//! 3. The role must be listed on that row, and the actor must own the
//!    proposal when the row is owner-only
//! 4. Action-specific checks (reason, council), then the new state, holder
//!    and SLA deadline are computed
//!
//! Everything here is pure: the caller persists the returned proposal and
//! log entry.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::council::{resolve_assignment, resolve_change, CouncilAssignment};
use super::error::WorkflowError;
use super::settings::WorkflowSettings;
use super::validation::{validate_expected_resume, validate_reason};
use crate::calendar::{at_cutoff, BusinessCalendar};
use crate::domain::{
    ActionPayload, Actor, Council, Proposal, ProposalState, Role, WorkflowAction, WorkflowLogEntry,
    RESEARCH_OFFICE_UNIT,
};

use crate::domain::ProposalState as S;
use crate::domain::WorkflowAction as A;

/// Which states a row applies to
#[derive(Debug, Clone, Copy)]
enum Applies {
    State(ProposalState),
    /// Review states before outline approval
    PreApprovalReview,
    /// Any non-terminal, non-paused state
    Active,
}

impl Applies {
    fn matches(self, state: ProposalState) -> bool {
        match self {
            Applies::State(s) => s == state,
            Applies::PreApprovalReview => state.is_pre_approval_review(),
            Applies::Active => !state.is_terminal() && state != S::Paused,
        }
    }
}

/// Where a row leads
#[derive(Debug, Clone, Copy)]
enum Target {
    State(ProposalState),
    /// The review state the last RETURN came from
    ReturnTarget,
    /// The state captured by PAUSE
    PrePause,
}

struct Rule {
    from: Applies,
    action: WorkflowAction,
    to: Target,
    roles: &'static [Role],
    owner_only: bool,
}

const fn rule(from: Applies, action: WorkflowAction, to: Target, roles: &'static [Role]) -> Rule {
    Rule {
        from,
        action,
        to,
        roles,
        owner_only: false,
    }
}

const fn owner_rule(from: Applies, action: WorkflowAction, to: Target) -> Rule {
    Rule {
        from,
        action,
        to,
        roles: &[Role::Lecturer],
        owner_only: true,
    }
}

const FACULTY: &[Role] = &[Role::FacultyManager, Role::FacultySecretary];
const FACULTY_OR_RECTOR: &[Role] = &[Role::FacultyManager, Role::RectorBoard];
const OFFICE: &[Role] = &[Role::ResearchOffice];
const OFFICE_OR_RECTOR: &[Role] = &[Role::ResearchOffice, Role::RectorBoard];
const COUNCIL_OR_RECTOR: &[Role] = &[Role::CouncilSecretary, Role::RectorBoard];
const OWNER_OR_OFFICE: &[Role] = &[Role::Lecturer, Role::ResearchOffice];

static TRANSITIONS: &[Rule] = &[
    owner_rule(Applies::State(S::Draft), A::Submit, Target::State(S::FacultyReview)),
    owner_rule(Applies::State(S::Draft), A::Cancel, Target::State(S::Cancelled)),
    rule(Applies::State(S::FacultyReview), A::Approve, Target::State(S::SchoolSelectionReview), FACULTY),
    rule(Applies::State(S::FacultyReview), A::Return, Target::State(S::ChangesRequested), FACULTY),
    rule(Applies::State(S::FacultyReview), A::Reject, Target::State(S::Rejected), FACULTY_OR_RECTOR),
    rule(Applies::State(S::SchoolSelectionReview), A::AssignCouncil, Target::State(S::OutlineCouncilReview), OFFICE),
    rule(Applies::State(S::SchoolSelectionReview), A::Return, Target::State(S::ChangesRequested), OFFICE),
    rule(Applies::State(S::SchoolSelectionReview), A::Reject, Target::State(S::Rejected), OFFICE_OR_RECTOR),
    rule(Applies::State(S::OutlineCouncilReview), A::ChangeCouncil, Target::State(S::OutlineCouncilReview), OFFICE),
    rule(Applies::State(S::OutlineCouncilReview), A::Approve, Target::State(S::Approved), COUNCIL_OR_RECTOR),
    rule(Applies::State(S::OutlineCouncilReview), A::Return, Target::State(S::ChangesRequested), COUNCIL_OR_RECTOR),
    rule(Applies::State(S::OutlineCouncilReview), A::Reject, Target::State(S::Rejected), COUNCIL_OR_RECTOR),
    owner_rule(Applies::State(S::ChangesRequested), A::Resubmit, Target::ReturnTarget),
    rule(Applies::State(S::ChangesRequested), A::Reject, Target::State(S::Rejected), FACULTY_OR_RECTOR),
    rule(Applies::State(S::Approved), A::StartProject, Target::State(S::InProgress), OWNER_OR_OFFICE),
    owner_rule(Applies::State(S::InProgress), A::SubmitAcceptance, Target::State(S::FacultyAcceptanceReview)),
    rule(Applies::State(S::FacultyAcceptanceReview), A::FacultyAccept, Target::State(S::SchoolAcceptanceReview), FACULTY),
    rule(Applies::State(S::FacultyAcceptanceReview), A::Return, Target::State(S::ChangesRequested), FACULTY),
    rule(Applies::State(S::SchoolAcceptanceReview), A::Accept, Target::State(S::Completed), OFFICE_OR_RECTOR),
    rule(Applies::State(S::SchoolAcceptanceReview), A::Return, Target::State(S::ChangesRequested), OFFICE_OR_RECTOR),
    rule(Applies::State(S::Completed), A::Handover, Target::State(S::Handover), OWNER_OR_OFFICE),
    owner_rule(Applies::PreApprovalReview, A::Withdraw, Target::State(S::Withdrawn)),
    rule(Applies::Active, A::Pause, Target::State(S::Paused), OFFICE),
    rule(Applies::State(S::Paused), A::Resume, Target::PrePause, OFFICE),
];

/// Inputs the machine needs besides the proposal itself
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub now: DateTime<Utc>,
    pub calendar: &'a BusinessCalendar,
    /// Council named by the payload for council actions, else the proposal's
    /// current council when it has one
    pub council: Option<&'a Council>,
    pub settings: &'a WorkflowSettings,
}

/// An applied transition, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub proposal: Proposal,
    pub previous_state: ProposalState,
    pub log: WorkflowLogEntry,
    pub council: Option<CouncilAssignment>,
    /// Deadline recomputed on RESUME
    pub new_sla_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Box<Transition>),
    /// CANCEL on a proposal that is already cancelled
    AlreadyApplied {
        state: ProposalState,
    },
}

/// Whether `role` appears on any row for `action`
pub fn role_may_perform(role: Role, action: WorkflowAction) -> bool {
    TRANSITIONS
        .iter()
        .any(|r| r.action == action && r.roles.contains(&role))
}

/// Actions with a row for `state`, whatever the role
pub fn available_actions(state: ProposalState) -> Vec<WorkflowAction> {
    let mut actions: Vec<_> = TRANSITIONS
        .iter()
        .filter(|r| r.from.matches(state))
        .map(|r| r.action)
        .collect();
    actions.dedup();
    actions
}

/// Whether `actor` could perform `action` on `proposal` right now, ignoring
/// payload checks
pub fn can_perform(proposal: &Proposal, action: WorkflowAction, actor: &Actor) -> bool {
    find_rule(proposal.state, action)
        .map(|r| authorize(r, proposal, action, actor).is_ok())
        .unwrap_or(false)
}

fn find_rule(state: ProposalState, action: WorkflowAction) -> Option<&'static Rule> {
    TRANSITIONS
        .iter()
        .find(|r| r.action == action && r.from.matches(state))
}

fn authorize(rule: &Rule, proposal: &Proposal, action: WorkflowAction, actor: &Actor) -> Result<(), WorkflowError> {
    if !rule.roles.contains(&actor.role) {
        return Err(WorkflowError::forbidden(
            actor.role,
            action,
            format!("not permitted in state {}", proposal.state),
        ));
    }
    if rule.owner_only && actor.id != proposal.owner_id {
        return Err(WorkflowError::forbidden(
            actor.role,
            action,
            "only the proposal owner may do this",
        ));
    }
    Ok(())
}

/// Compute the result of `action` on `proposal`
pub fn transition(
    proposal: &Proposal,
    action: WorkflowAction,
    actor: &Actor,
    payload: &ActionPayload,
    ctx: &TransitionContext<'_>,
) -> Result<TransitionOutcome, WorkflowError> {
    if !role_may_perform(actor.role, action) {
        return Err(WorkflowError::forbidden(
            actor.role,
            action,
            "role has no permission for this action",
        ));
    }

    if action == A::Cancel && proposal.state == S::Cancelled {
        if actor.id != proposal.owner_id {
            return Err(WorkflowError::forbidden(
                actor.role,
                action,
                "only the proposal owner may do this",
            ));
        }
        return Ok(TransitionOutcome::AlreadyApplied { state: S::Cancelled });
    }

    let rule = find_rule(proposal.state, action).ok_or(WorkflowError::InvalidTransition {
        state: proposal.state,
        action,
    })?;

    authorize(rule, proposal, action, actor)?;
    validate_reason(action, payload, &ctx.settings.validation)?;

    let target = match rule.to {
        Target::State(state) => state,
        Target::ReturnTarget => proposal.return_target_state.unwrap_or(S::FacultyReview),
        Target::PrePause => proposal.pre_pause_state.ok_or_else(|| {
            WorkflowError::validation(
                "pre_pause_state",
                format!("paused proposal {} has no captured state", proposal.code),
            )
        })?,
    };

    let previous_state = proposal.state;
    let mut next = proposal.clone();
    next.state = target;
    next.updated_at = ctx.now;

    let mut council = None;
    let mut new_sla_deadline = None;
    let mut metadata = None;

    match action {
        A::Pause => {
            validate_expected_resume(payload, ctx.now.date_naive())?;
            apply_pause(&mut next, proposal, payload, ctx.now);
            metadata = Some(json!({
                "pre_pause_state": previous_state,
                "expected_resume_at": payload.expected_resume_at,
            }));
        }
        A::Resume => {
            new_sla_deadline = apply_resume(&mut next, proposal, ctx);
            metadata = Some(json!({
                "restored_state": target,
                "new_sla_deadline": new_sla_deadline,
            }));
        }
        A::AssignCouncil | A::ChangeCouncil => {
            let selection = payload
                .council
                .as_ref()
                .ok_or_else(|| WorkflowError::validation("council", format!("{} requires a council", action)))?;

            let assignment = if action == A::AssignCouncil {
                resolve_assignment(proposal, ctx.council, selection)?
            } else {
                resolve_change(proposal, ctx.council, selection, payload.reason.as_deref())?
            };

            let (unit, secretary) = assignment.holder();
            next.council_id = Some(assignment.council_id.clone());
            next.holder_unit = Some(unit);
            next.holder_user = Some(secretary);
            apply_deadline(&mut next, previous_state, ctx);

            metadata = serde_json::to_value(&assignment).ok();
            council = Some(assignment);
        }
        _ => {
            if action == A::Return {
                next.return_target_state = Some(previous_state);
            } else if action == A::Resubmit {
                next.return_target_state = None;
            }

            let (unit, user) = holder_for(&next, actor, ctx.council);
            next.holder_unit = unit;
            next.holder_user = user;
            apply_deadline(&mut next, previous_state, ctx);
        }
    }

    let log = WorkflowLogEntry::new(proposal.id, action, actor, previous_state, target, ctx.now)
        .with_comment(payload.comment.clone())
        .with_reason(payload.reason.clone())
        .with_metadata(metadata);

    Ok(TransitionOutcome::Applied(Box::new(Transition {
        proposal: next,
        previous_state,
        log,
        council,
        new_sla_deadline,
    })))
}

/// Holder for a proposal that has just entered `proposal.state`
fn holder_for(proposal: &Proposal, actor: &Actor, council: Option<&Council>) -> (Option<String>, Option<String>) {
    let faculty = Some(proposal.faculty_id.clone());
    match proposal.state {
        S::Draft | S::ChangesRequested | S::Approved | S::InProgress | S::Completed => {
            (faculty, Some(proposal.owner_id.clone()))
        }
        S::FacultyReview | S::FacultyAcceptanceReview => (faculty, None),
        S::SchoolSelectionReview | S::SchoolAcceptanceReview | S::Paused => {
            (Some(RESEARCH_OFFICE_UNIT.to_string()), None)
        }
        S::OutlineCouncilReview => {
            let secretary = council
                .filter(|c| Some(&c.id) == proposal.council_id.as_ref())
                .and_then(|c| c.secretaries().next())
                .map(|m| m.user_id.clone());
            (proposal.council_id.clone().or(faculty), secretary)
        }
        S::Rejected | S::Cancelled | S::Handover | S::Withdrawn => (faculty, Some(actor.id.clone())),
    }
}

/// Restart or clear the SLA clock after a state change
fn apply_deadline(next: &mut Proposal, previous_state: ProposalState, ctx: &TransitionContext<'_>) {
    if next.state == previous_state {
        return;
    }

    match ctx.settings.sla.budgets.budget_for(next.state) {
        Some(budget) => {
            let due = ctx.calendar.add_working_days(ctx.now.date_naive(), budget);
            next.sla_started_at = Some(ctx.now);
            next.sla_deadline = Some(at_cutoff(due, ctx.settings.sla.cutoff_hour));
        }
        None => {
            next.sla_started_at = None;
            next.sla_deadline = None;
        }
    }
}

/// Capture state and holder; the deadline stays frozen
fn apply_pause(next: &mut Proposal, current: &Proposal, payload: &ActionPayload, now: DateTime<Utc>) {
    next.pre_pause_state = Some(current.state);
    next.pre_pause_holder_unit = current.holder_unit.clone();
    next.pre_pause_holder_user = current.holder_user.clone();
    next.paused_at = Some(now);
    next.expected_resume_at = payload.expected_resume_at;
    next.holder_unit = Some(RESEARCH_OFFICE_UNIT.to_string());
    next.holder_user = None;
}

/// Restore the pre-pause state and give back the unused budget.
///
/// Remaining budget is the working days between the pause and the frozen
/// deadline, never less than one.
fn apply_resume(next: &mut Proposal, current: &Proposal, ctx: &TransitionContext<'_>) -> Option<DateTime<Utc>> {
    next.holder_unit = current.pre_pause_holder_unit.clone();
    next.holder_user = current.pre_pause_holder_user.clone();
    next.pre_pause_state = None;
    next.pre_pause_holder_unit = None;
    next.pre_pause_holder_user = None;
    next.paused_at = None;
    next.expected_resume_at = None;

    let budget = ctx.settings.sla.budgets.budget_for(next.state);
    let remaining = match (budget, current.sla_deadline, current.paused_at) {
        (None, _, _) => None,
        (Some(_), Some(deadline), Some(paused_at)) => Some(
            ctx.calendar
                .count_working_days(paused_at.date_naive(), deadline.date_naive())
                .max(1),
        ),
        (Some(full), _, _) => Some(full.max(1)),
    };

    next.sla_deadline = remaining.map(|days| {
        let due = ctx.calendar.add_working_days(ctx.now.date_naive(), days);
        at_cutoff(due, ctx.settings.sla.cutoff_hour)
    });
    if next.sla_deadline.is_some() {
        next.sla_started_at = Some(ctx.now);
    } else {
        next.sla_started_at = None;
    }

    next.sla_deadline
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn proposal_in(state: ProposalState) -> Proposal {
        let mut p = Proposal::new_draft("DT-1", "Rice genomics", "lecturer-1", "fac-bio", at(2026, 10, 1, 9));
        p.state = state;
        p
    }

    fn owner() -> Actor {
        Actor::new("lecturer-1", "Dr. Owner", Role::Lecturer)
    }

    fn run(
        proposal: &Proposal,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let calendar = BusinessCalendar::weekdays_only();
        let settings = WorkflowSettings::default();
        let ctx = TransitionContext {
            now,
            calendar: &calendar,
            council: None,
            settings: &settings,
        };
        transition(proposal, action, actor, payload, &ctx)
    }

    fn applied(outcome: TransitionOutcome) -> Transition {
        match outcome {
            TransitionOutcome::Applied(t) => *t,
            other => panic!("expected applied transition, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_starts_faculty_clock() {
        let p = proposal_in(S::Draft);
        // Friday 2026-10-16 10:00 + 3 working days = Wednesday 2026-10-21
        let t = applied(run(&p, A::Submit, &owner(), &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap());

        assert_eq!(t.proposal.state, S::FacultyReview);
        assert_eq!(t.proposal.holder_unit.as_deref(), Some("fac-bio"));
        assert_eq!(t.proposal.holder_user, None);
        assert_eq!(t.proposal.sla_deadline, Some(at(2026, 10, 21, 17)));
        assert_eq!(t.log.previous_state, S::Draft);
        assert_eq!(t.log.new_state, S::FacultyReview);
    }

    #[test]
    fn test_role_without_permission_is_forbidden_before_state() {
        // ADMIN never appears in the table, even on an unknown pair
        let p = proposal_in(S::Draft);
        let admin = Actor::new("root", "Admin", Role::Admin);
        let err = run(&p, A::Approve, &admin, &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN_TRANSITION");
    }

    #[test]
    fn test_unknown_pair_is_invalid() {
        let p = proposal_in(S::Draft);
        let manager = Actor::new("m-1", "Manager", Role::FacultyManager);
        let err = run(&p, A::Approve, &manager, &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_role_permitted_elsewhere_but_not_on_row() {
        // FACULTY_SECRETARY may APPROVE at faculty review but not at council review
        let p = proposal_in(S::OutlineCouncilReview);
        let secretary = Actor::new("fs-1", "Faculty Sec", Role::FacultySecretary);
        let err = run(&p, A::Approve, &secretary, &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN_TRANSITION");
    }

    #[test]
    fn test_owner_only_rows() {
        let p = proposal_in(S::Draft);
        let stranger = Actor::new("lecturer-2", "Someone Else", Role::Lecturer);
        let err = run(&p, A::Submit, &stranger, &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN_TRANSITION");
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let payload = ActionPayload::with_reason("budget freeze");
        for state in [S::Rejected, S::Withdrawn, S::Handover] {
            let p = proposal_in(state);
            let err = run(&p, A::Pause, &office, &payload, at(2026, 10, 16, 10)).unwrap_err();
            assert_eq!(err.code(), "INVALID_TRANSITION", "state {}", state);
        }
    }

    #[test]
    fn test_return_then_resubmit_goes_back() {
        let p = proposal_in(S::FacultyReview);
        let manager = Actor::new("m-1", "Manager", Role::FacultyManager);
        let returned = applied(
            run(&p, A::Return, &manager, &ActionPayload::with_reason("missing budget table"), at(2026, 10, 16, 10))
                .unwrap(),
        );

        assert_eq!(returned.proposal.state, S::ChangesRequested);
        assert_eq!(returned.proposal.return_target_state, Some(S::FacultyReview));
        assert_eq!(returned.proposal.holder_user.as_deref(), Some("lecturer-1"));
        assert_eq!(returned.log.reason.as_deref(), Some("missing budget table"));

        let resubmitted = applied(
            run(&returned.proposal, A::Resubmit, &owner(), &ActionPayload::default(), at(2026, 10, 19, 9)).unwrap(),
        );
        assert_eq!(resubmitted.proposal.state, S::FacultyReview);
        assert_eq!(resubmitted.proposal.return_target_state, None);
        assert_eq!(resubmitted.proposal.holder_user, None);
    }

    #[test]
    fn test_short_reason_rejected() {
        let p = proposal_in(S::FacultyReview);
        let manager = Actor::new("m-1", "Manager", Role::FacultyManager);
        let err = run(&p, A::Reject, &manager, &ActionPayload::with_reason("no"), at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_reject_holder_is_deciding_actor() {
        let p = proposal_in(S::FacultyReview);
        let rector = Actor::new("r-1", "Rector", Role::RectorBoard);
        let t = applied(
            run(&p, A::Reject, &rector, &ActionPayload::with_reason("out of scope"), at(2026, 10, 16, 10)).unwrap(),
        );
        assert_eq!(t.proposal.state, S::Rejected);
        assert_eq!(t.proposal.holder_user.as_deref(), Some("r-1"));
        assert_eq!(t.proposal.sla_deadline, None);
    }

    #[test]
    fn test_cancel_twice_is_noop() {
        let p = proposal_in(S::Cancelled);
        let outcome = run(&p, A::Cancel, &owner(), &ActionPayload::default(), at(2026, 10, 16, 10)).unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyApplied { state: S::Cancelled });
    }

    #[test]
    fn test_withdraw_only_before_approval() {
        let payload = ActionPayload::with_reason("moving institutions");
        let p = proposal_in(S::ChangesRequested);
        let t = applied(run(&p, A::Withdraw, &owner(), &payload, at(2026, 10, 16, 10)).unwrap());
        assert_eq!(t.proposal.state, S::Withdrawn);

        let p = proposal_in(S::InProgress);
        let err = run(&p, A::Withdraw, &owner(), &payload, at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_pause_resume_restores_state_and_extends_deadline() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let mut p = proposal_in(S::OutlineCouncilReview);
        p.council_id = Some("c-1".into());
        p.holder_unit = Some("c-1".into());
        p.holder_user = Some("sec-1".into());
        // Deadline Friday 2026-10-23 17:00
        p.sla_deadline = Some(at(2026, 10, 23, 17));

        // Paused Monday 2026-10-19: 4 working days remain (Tue..Fri)
        let paused = applied(
            run(&p, A::Pause, &office, &ActionPayload::with_reason("ethics board review"), at(2026, 10, 19, 10))
                .unwrap(),
        );
        assert_eq!(paused.proposal.state, S::Paused);
        assert_eq!(paused.proposal.pre_pause_state, Some(S::OutlineCouncilReview));
        assert_eq!(paused.proposal.holder_unit.as_deref(), Some(RESEARCH_OFFICE_UNIT));
        assert_eq!(paused.proposal.sla_deadline, Some(at(2026, 10, 23, 17)));
        assert!(paused.proposal.check_invariants().is_ok());

        // Resumed Monday 2026-11-02 -> Friday 2026-11-06
        let resume_at = at(2026, 11, 2, 11);
        let resumed = applied(run(&paused.proposal, A::Resume, &office, &ActionPayload::default(), resume_at).unwrap());
        assert_eq!(resumed.proposal.state, S::OutlineCouncilReview);
        assert_eq!(resumed.proposal.holder_user.as_deref(), Some("sec-1"));
        assert_eq!(resumed.proposal.pre_pause_state, None);
        assert_eq!(resumed.proposal.paused_at, None);
        assert_eq!(resumed.new_sla_deadline, Some(at(2026, 11, 6, 17)));
        assert!(resumed.new_sla_deadline.unwrap() > resume_at);
    }

    #[test]
    fn test_resume_after_deadline_passed_gets_one_day() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let mut p = proposal_in(S::Paused);
        p.pre_pause_state = Some(S::FacultyReview);
        p.pre_pause_holder_unit = Some("fac-bio".into());
        p.paused_at = Some(at(2026, 10, 23, 18));
        p.sla_deadline = Some(at(2026, 10, 23, 17));

        let t = applied(run(&p, A::Resume, &office, &ActionPayload::default(), at(2026, 10, 26, 9)).unwrap());
        assert_eq!(t.new_sla_deadline, Some(at(2026, 10, 27, 17)));
    }

    #[test]
    fn test_resume_into_state_without_clock() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let mut p = proposal_in(S::Paused);
        p.pre_pause_state = Some(S::InProgress);
        p.pre_pause_holder_unit = Some("fac-bio".into());
        p.pre_pause_holder_user = Some("lecturer-1".into());
        p.paused_at = Some(at(2026, 10, 1, 9));

        let t = applied(run(&p, A::Resume, &office, &ActionPayload::default(), at(2026, 10, 26, 9)).unwrap());
        assert_eq!(t.proposal.state, S::InProgress);
        assert_eq!(t.new_sla_deadline, None);
    }

    #[test]
    fn test_pause_rejects_past_resume_date() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let p = proposal_in(S::InProgress);
        let mut payload = ActionPayload::with_reason("lab closed");
        payload.expected_resume_at = Some(at(2026, 10, 1, 0).date_naive());
        let err = run(&p, A::Pause, &office, &payload, at(2026, 10, 16, 10)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_paused_cannot_be_paused_again() {
        let office = Actor::new("ro-1", "Office", Role::ResearchOffice);
        let mut p = proposal_in(S::Paused);
        p.pre_pause_state = Some(S::InProgress);
        let err = run(&p, A::Pause, &office, &ActionPayload::with_reason("again please"), at(2026, 10, 16, 10))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_available_actions() {
        let actions = available_actions(S::Draft);
        assert!(actions.contains(&A::Submit));
        assert!(actions.contains(&A::Cancel));
        assert!(actions.contains(&A::Pause));
        assert!(available_actions(S::Handover).is_empty());
    }

    #[test]
    fn test_admin_has_no_workflow_permissions() {
        for action in WorkflowAction::ALL {
            assert!(!role_may_perform(Role::Admin, action), "{}", action);
        }
    }
}
