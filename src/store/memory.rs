//! In-memory store, for tests and one-shot runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Claim, IdempotencyStore, StoreError, TransitionCommit, WorkflowStore};
use crate::calendar::CalendarEntry;
use crate::domain::{
    Council, IdempotencyRecord, IdempotencyStatus, Proposal, WorkflowAction, WorkflowLogEntry,
};

#[derive(Debug, Default)]
struct MemoryState {
    proposals: HashMap<Uuid, Proposal>,
    logs: Vec<WorkflowLogEntry>,
    councils: HashMap<String, Council>,
    calendar: BTreeMap<NaiveDate, CalendarEntry>,
    idempotency: HashMap<(String, String), IdempotencyRecord>,
}

/// Both store ports over process-local maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with calendar entries
    pub fn with_calendar(entries: impl IntoIterator<Item = CalendarEntry>) -> Self {
        let state = MemoryState {
            calendar: entries.into_iter().map(|e| (e.date, e)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Number of idempotency records currently held
    pub async fn idempotency_len(&self) -> usize {
        self.state.lock().await.idempotency.len()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.proposals.contains_key(&proposal.id)
            || state.proposals.values().any(|p| p.code == proposal.code)
        {
            return Err(StoreError::Duplicate {
                entity: "proposal",
                id: proposal.code.clone(),
            });
        }
        state.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        Ok(self.state.lock().await.proposals.get(&id).cloned())
    }

    async fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        let state = self.state.lock().await;
        let mut proposals: Vec<_> = state.proposals.values().cloned().collect();
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));
        Ok(proposals)
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let id = commit.proposal.id;

        let stored = state.proposals.get_mut(&id).ok_or_else(|| StoreError::Missing {
            entity: "proposal",
            id: id.to_string(),
        })?;

        if stored.version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                proposal_id: id,
                expected: commit.expected_version,
            });
        }

        *stored = commit.proposal.clone();
        state.logs.push(commit.log.clone());

        if let Some(done) = &commit.completion {
            if let Some(record) = state
                .idempotency
                .get_mut(&(done.scope.clone(), done.key.clone()))
                .filter(|r| r.status == IdempotencyStatus::InProgress)
            {
                record.status = IdempotencyStatus::Completed;
                record.result = Some(done.result.clone());
            }
        }
        Ok(())
    }

    async fn workflow_log(&self, proposal_id: Uuid) -> Result<Vec<WorkflowLogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|entry| entry.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    async fn last_log_for(
        &self,
        proposal_id: Uuid,
        action: WorkflowAction,
    ) -> Result<Option<WorkflowLogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .rev()
            .find(|entry| entry.proposal_id == proposal_id && entry.action == action)
            .cloned())
    }

    async fn upsert_council(&self, council: &Council) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.councils.insert(council.id.clone(), council.clone());
        Ok(())
    }

    async fn get_council(&self, id: &str) -> Result<Option<Council>, StoreError> {
        Ok(self.state.lock().await.councils.get(id).cloned())
    }

    async fn calendar_entries(&self) -> Result<Vec<CalendarEntry>, StoreError> {
        Ok(self.state.lock().await.calendar.values().cloned().collect())
    }

    async fn upsert_calendar_entry(&self, entry: &CalendarEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.calendar.insert(entry.date, entry.clone());
        Ok(())
    }

    async fn remove_calendar_entry(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.calendar.remove(&date).is_some())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn try_claim(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> Result<Claim, StoreError> {
        let mut state = self.state.lock().await;
        let slot = (record.scope.clone(), record.key.clone());

        if let Some(existing) = state.idempotency.get(&slot) {
            if !existing.is_expired(now) {
                return Ok(Claim::Existing(existing.clone()));
            }
        }

        state.idempotency.insert(slot, record.clone());
        Ok(Claim::Acquired)
    }

    async fn lookup(
        &self,
        scope: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .idempotency
            .get(&(scope.to_string(), key.to_string()))
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn finish(
        &self,
        scope: &str,
        key: &str,
        status: IdempotencyStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.idempotency.get_mut(&(scope.to_string(), key.to_string())) {
            Some(record) if record.status == IdempotencyStatus::InProgress => {
                record.status = status;
                record.result = Some(result.clone());
                Ok(())
            }
            Some(record) if record.status == status => Ok(()),
            _ => Err(StoreError::Missing {
                entity: "in-progress idempotency record",
                id: format!("{}/{}", scope, key),
            }),
        }
    }

    async fn release(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let slot = (scope.to_string(), key.to_string());
        if state
            .idempotency
            .get(&slot)
            .map_or(false, |r| r.status == IdempotencyStatus::InProgress)
        {
            state.idempotency.remove(&slot);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.idempotency.len();
        state.idempotency.retain(|_, record| !record.is_expired(now));
        Ok(before - state.idempotency.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, ProposalState, Role};
    use chrono::Duration;

    fn draft() -> Proposal {
        Proposal::new_draft("DT-9", "Water quality", "u-1", "fac-1", Utc::now())
    }

    #[tokio::test]
    async fn test_commit_checks_version() {
        let store = MemoryStore::new();
        let proposal = draft();
        store.insert_proposal(&proposal).await.unwrap();

        let actor = Actor::new("u-1", "Owner", Role::Lecturer);
        let mut next = proposal.clone();
        next.state = ProposalState::FacultyReview;
        let log = WorkflowLogEntry::new(
            proposal.id,
            WorkflowAction::Submit,
            &actor,
            ProposalState::Draft,
            ProposalState::FacultyReview,
            Utc::now(),
        );

        let commit = TransitionCommit::new(next, log);
        store.commit_transition(&commit).await.unwrap();

        // Same commit again is computed against a stale version
        let err = store.commit_transition(&commit).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let stored = store.get_proposal(proposal.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.workflow_log(proposal.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryStore::new();
        store.insert_proposal(&draft()).await.unwrap();
        assert!(store.insert_proposal(&draft()).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_evicts_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = IdempotencyRecord::in_progress("s", "k", "f1", now - Duration::hours(48), Duration::hours(24));
        assert_eq!(store.try_claim(&old, now - Duration::hours(48)).await.unwrap(), Claim::Acquired);

        let fresh = IdempotencyRecord::in_progress("s", "k", "f2", now, Duration::hours(24));
        assert_eq!(store.try_claim(&fresh, now).await.unwrap(), Claim::Acquired);

        match store.try_claim(&fresh, now).await.unwrap() {
            Claim::Existing(record) => assert_eq!(record.fingerprint, "f2"),
            Claim::Acquired => panic!("slot should be taken"),
        }
    }
}
