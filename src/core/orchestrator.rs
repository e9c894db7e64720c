//! Workflow orchestrator.
//!
//! Entry point for every state-changing request. For one action it:
//! - validates the request at the boundary; a reused key is reported
//!   ahead of a malformed payload
//! - resolves idempotency for (action scope, idempotency key)
//! - loads the proposal, calendar snapshot and council under a deadline
//! - runs the state machine
//! - commits proposal + log entry + completed idempotency record with an
//!   optimistic version check

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::deadline::with_deadline;
use super::error::WorkflowError;
use super::idempotency::{fingerprint, IdempotencyCache};
use super::settings::WorkflowSettings;
use super::state_machine::{transition, TransitionContext, TransitionOutcome};
use super::validation::{validate_idempotency_key, validate_payload};
use crate::calendar::BusinessCalendar;
use crate::domain::{
    ActionPayload, ActionRequest, Actor, Council, Proposal, ProposalState, WorkflowAction,
    WorkflowLogEntry,
};
use crate::store::{IdempotencyStore, SlotCompletion, StoreError, TransitionCommit, WorkflowStore};

/// Body of a successful action response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub proposal_id: Uuid,
    pub previous_state: ProposalState,
    pub current_state: ProposalState,
    pub action: WorkflowAction,
    pub timestamp: DateTime<Utc>,

    /// Entry written by this action, or the original entry for a no-op
    pub workflow_log_id: Option<Uuid>,

    pub holder_unit: Option<String>,
    pub holder_user: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,

    /// RESUME only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sla_deadline: Option<DateTime<Utc>>,

    /// ASSIGN_COUNCIL / CHANGE_COUNCIL only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council_id: Option<String>,

    /// CHANGE_COUNCIL only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_council_id: Option<String>,

    /// Set when the proposal was already in the requested terminal state
    #[serde(default, skip_serializing_if = "is_false")]
    pub already_applied: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome plus whether it was served from the idempotency cache
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub outcome: ActionOutcome,
    pub replayed: bool,
}

/// Fields that identify a request for idempotency purposes
#[derive(Serialize)]
struct RequestFingerprint<'a> {
    proposal_id: Uuid,
    action: WorkflowAction,
    payload: &'a ActionPayload,
    actor_id: &'a str,
}

/// Idempotency slot an action runs under
#[derive(Clone, Copy)]
struct Slot<'a> {
    scope: &'a str,
    key: &'a str,
}

/// Everything read before the transition is computed
struct Snapshot {
    proposal: Proposal,
    calendar: BusinessCalendar,
    council: Option<Council>,
}

/// Workflow façade over the state machine and the stores
pub struct WorkflowOrchestrator {
    store: Arc<dyn WorkflowStore>,
    idempotency: IdempotencyCache,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
}

impl WorkflowOrchestrator {
    /// Create an orchestrator driven by the system clock
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        idempotency_store: Arc<dyn IdempotencyStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            idempotency: IdempotencyCache::new(idempotency_store, settings.idempotency.ttl_hours),
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Create a proposal in DRAFT owned by `owner`
    #[instrument(skip(self, title, owner), fields(owner = %owner.id))]
    pub async fn create_proposal(
        &self,
        code: &str,
        title: &str,
        owner: &Actor,
        faculty_id: &str,
    ) -> Result<Proposal, WorkflowError> {
        if code.trim().is_empty() {
            return Err(WorkflowError::validation("code", "must not be empty"));
        }
        if faculty_id.trim().is_empty() {
            return Err(WorkflowError::validation("faculty_id", "must not be empty"));
        }

        let proposal = Proposal::new_draft(
            code.trim(),
            title.trim(),
            owner.id.as_str(),
            faculty_id.trim(),
            self.clock.now(),
        );

        self.store
            .insert_proposal(&proposal)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => WorkflowError::validation("code", e.to_string()),
                other => other.into(),
            })?;

        info!(proposal_id = %proposal.id, "Created proposal");
        Ok(proposal)
    }

    pub async fn proposal(&self, id: Uuid) -> Result<Proposal, WorkflowError> {
        self.store
            .get_proposal(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("proposal", id.to_string()))
    }

    /// Audit trail of a proposal, oldest first
    pub async fn workflow_log(&self, id: Uuid) -> Result<Vec<WorkflowLogEntry>, WorkflowError> {
        self.proposal(id).await?;
        Ok(self.store.workflow_log(id).await?)
    }

    /// Housekeeping for the idempotency store
    pub async fn purge_expired_idempotency(&self) -> Result<usize, WorkflowError> {
        self.idempotency.purge_expired(self.clock.now()).await
    }

    /// Perform one workflow action exactly once per idempotency key
    #[instrument(
        skip(self, request, actor),
        fields(proposal_id = %request.proposal_id, action = %request.action, actor = %actor.id)
    )]
    pub async fn perform_action(
        &self,
        request: &ActionRequest,
        actor: &Actor,
    ) -> Result<ActionResult, WorkflowError> {
        let now = self.clock.now();
        let key = validate_idempotency_key(&request.idempotency_key)?.to_string();
        let scope = request.action.scope();

        let request_fingerprint = fingerprint(&RequestFingerprint {
            proposal_id: request.proposal_id,
            action: request.action,
            payload: &request.payload,
            actor_id: &actor.id,
        })?;

        if let Err(invalid) = validate_payload(request, now.date_naive(), &self.settings.validation) {
            self.idempotency
                .reject_reuse(&scope, &key, &request_fingerprint, now)
                .await?;
            return Err(invalid);
        }

        let slot = Slot {
            scope: &scope,
            key: &key,
        };
        let executed = self
            .idempotency
            .execute(&scope, &key, &request_fingerprint, now, || {
                self.apply(request, actor, now, slot)
            })
            .await?;

        if executed.replayed {
            info!("Replayed earlier result");
        }

        Ok(ActionResult {
            outcome: executed.value,
            replayed: executed.replayed,
        })
    }

    /// Load, transition and commit. Runs inside the idempotency slot.
    async fn apply(
        &self,
        request: &ActionRequest,
        actor: &Actor,
        now: DateTime<Utc>,
        slot: Slot<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let limit = Duration::from_millis(self.settings.timeouts.load_timeout_ms);
        let snapshot = with_deadline("load", limit, self.load(request)).await?;

        let ctx = TransitionContext {
            now,
            calendar: &snapshot.calendar,
            council: snapshot.council.as_ref(),
            settings: &self.settings,
        };

        match transition(&snapshot.proposal, request.action, actor, &request.payload, &ctx)? {
            TransitionOutcome::AlreadyApplied { state } => {
                let original = self
                    .store
                    .last_log_for(snapshot.proposal.id, request.action)
                    .await?;
                info!(state = %state, "Action already applied, nothing to do");

                let proposal = &snapshot.proposal;
                Ok(ActionOutcome {
                    proposal_id: proposal.id,
                    previous_state: original.as_ref().map_or(state, |log| log.previous_state),
                    current_state: state,
                    action: request.action,
                    timestamp: original.as_ref().map_or(now, |log| log.timestamp),
                    workflow_log_id: original.as_ref().map(|log| log.id),
                    holder_unit: proposal.holder_unit.clone(),
                    holder_user: proposal.holder_user.clone(),
                    sla_deadline: proposal.sla_deadline,
                    new_sla_deadline: None,
                    council_id: None,
                    previous_council_id: None,
                    already_applied: true,
                })
            }
            TransitionOutcome::Applied(applied) => {
                let applied = *applied;
                applied
                    .proposal
                    .check_invariants()
                    .map_err(|message| WorkflowError::Storage { message })?;

                let commit = TransitionCommit::new(applied.proposal, applied.log);
                let (council_id, previous_council_id) = match applied.council {
                    Some(assignment) => (Some(assignment.council_id), assignment.previous_council_id),
                    None => (None, None),
                };

                let proposal = &commit.proposal;
                let outcome = ActionOutcome {
                    proposal_id: proposal.id,
                    previous_state: applied.previous_state,
                    current_state: proposal.state,
                    action: request.action,
                    timestamp: commit.log.timestamp,
                    workflow_log_id: Some(commit.log.id),
                    holder_unit: proposal.holder_unit.clone(),
                    holder_user: proposal.holder_user.clone(),
                    sla_deadline: proposal.sla_deadline,
                    new_sla_deadline: applied.new_sla_deadline,
                    council_id,
                    previous_council_id,
                    already_applied: false,
                };

                let completion = SlotCompletion {
                    scope: slot.scope.to_string(),
                    key: slot.key.to_string(),
                    result: serde_json::to_value(&outcome).map_err(|e| WorkflowError::Storage {
                        message: format!("failed to encode outcome: {}", e),
                    })?,
                };
                let commit = commit.with_completion(completion);

                self.store.commit_transition(&commit).await?;

                info!(
                    from = %applied.previous_state,
                    to = %outcome.current_state,
                    version = commit.proposal.version,
                    "Transition committed"
                );
                Ok(outcome)
            }
        }
    }

    async fn load(&self, request: &ActionRequest) -> Result<Snapshot, WorkflowError> {
        let proposal = self
            .store
            .get_proposal(request.proposal_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("proposal", request.proposal_id.to_string()))?;

        let calendar = BusinessCalendar::new(self.store.calendar_entries().await?);

        let council_id = if request.action.is_council_action() {
            request.payload.council.as_ref().map(|c| c.council_id.clone())
        } else {
            proposal.council_id.clone()
        };

        let council = match council_id {
            Some(id) => self.store.get_council(&id).await?,
            None => None,
        };

        debug!(
            state = %proposal.state,
            version = proposal.version,
            calendar_entries = calendar.len(),
            council = council.is_some(),
            "Loaded snapshot"
        );

        Ok(Snapshot {
            proposal,
            calendar,
            council,
        })
    }
}
