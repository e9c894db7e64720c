//! SQLite store.
//!
//! A single connection behind a mutex; every call runs on the blocking
//! pool. Proposal commits use `UPDATE ... WHERE version = ?` inside a
//! transaction, so two writers racing on one proposal cannot both win.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use super::{Claim, IdempotencyStore, StoreError, TransitionCommit, WorkflowStore};
use crate::calendar::CalendarEntry;
use crate::domain::{
    Council, CouncilMember, IdempotencyRecord, IdempotencyStatus, Proposal, WorkflowAction,
    WorkflowLogEntry,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proposals (
  id TEXT PRIMARY KEY,
  code TEXT NOT NULL UNIQUE,
  title TEXT NOT NULL,
  state TEXT NOT NULL,
  owner_id TEXT NOT NULL,
  faculty_id TEXT NOT NULL,
  council_id TEXT,
  holder_unit TEXT,
  holder_user TEXT,
  sla_started_at TEXT,
  sla_deadline TEXT,
  pre_pause_state TEXT,
  pre_pause_holder_unit TEXT,
  pre_pause_holder_user TEXT,
  paused_at TEXT,
  expected_resume_at TEXT,
  return_target_state TEXT,
  version INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workflow_logs (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT NOT NULL UNIQUE,
  proposal_id TEXT NOT NULL,
  action TEXT NOT NULL,
  actor_id TEXT NOT NULL,
  actor_name TEXT NOT NULL,
  previous_state TEXT NOT NULL,
  new_state TEXT NOT NULL,
  timestamp TEXT NOT NULL,
  comment TEXT,
  reason TEXT,
  metadata_json TEXT
);

CREATE TABLE IF NOT EXISTS councils (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  council_type TEXT NOT NULL,
  secretary_id TEXT
);

CREATE TABLE IF NOT EXISTS council_members (
  council_id TEXT NOT NULL,
  user_id TEXT NOT NULL,
  display_name TEXT NOT NULL,
  role TEXT NOT NULL,
  PRIMARY KEY (council_id, user_id)
);

CREATE TABLE IF NOT EXISTS business_calendar (
  date TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  is_holiday INTEGER NOT NULL,
  is_working_day INTEGER NOT NULL,
  recurring INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS idempotency_records (
  scope TEXT NOT NULL,
  key TEXT NOT NULL,
  fingerprint TEXT NOT NULL,
  status TEXT NOT NULL,
  result_json TEXT,
  created_at_ms INTEGER NOT NULL,
  expires_at_ms INTEGER NOT NULL,
  PRIMARY KEY (scope, key)
);

CREATE INDEX IF NOT EXISTS idx_workflow_logs_proposal ON workflow_logs(proposal_id, seq);
CREATE INDEX IF NOT EXISTS idx_idempotency_expires ON idempotency_records(expires_at_ms);
"#;

const PROPOSAL_COLUMNS: &str = "id, code, title, state, owner_id, faculty_id, council_id, \
     holder_unit, holder_user, sla_started_at, sla_deadline, pre_pause_state, \
     pre_pause_holder_unit, pre_pause_holder_user, paused_at, expected_resume_at, \
     return_target_state, version, created_at, updated_at";

const LOG_COLUMNS: &str = "id, proposal_id, action, actor_id, actor_name, previous_state, \
     new_state, timestamp, comment, reason, metadata_json";

/// Both store ports over one SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
            "#,
        )?;
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn insert_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let proposal = proposal.clone();
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM proposals WHERE id = ?1 OR code = ?2)",
                params![proposal.id.to_string(), proposal.code],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StoreError::Duplicate {
                    entity: "proposal",
                    id: proposal.code.clone(),
                });
            }

            conn.execute(
                &format!(
                    "INSERT INTO proposals ({}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                    PROPOSAL_COLUMNS
                ),
                params![
                    proposal.id.to_string(),
                    proposal.code,
                    proposal.title,
                    proposal.state.as_str(),
                    proposal.owner_id,
                    proposal.faculty_id,
                    proposal.council_id,
                    proposal.holder_unit,
                    proposal.holder_user,
                    proposal.sla_started_at.map(|t| t.to_rfc3339()),
                    proposal.sla_deadline.map(|t| t.to_rfc3339()),
                    proposal.pre_pause_state.map(|s| s.as_str()),
                    proposal.pre_pause_holder_unit,
                    proposal.pre_pause_holder_user,
                    proposal.paused_at.map(|t| t.to_rfc3339()),
                    proposal.expected_resume_at.map(|d| d.to_string()),
                    proposal.return_target_state.map(|s| s.as_str()),
                    proposal.version,
                    proposal.created_at.to_rfc3339(),
                    proposal.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_proposal(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM proposals WHERE id = ?1", PROPOSAL_COLUMNS),
                    params![id.to_string()],
                    proposal_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM proposals ORDER BY created_at, code",
                PROPOSAL_COLUMNS
            ))?;
            let rows = stmt.query_map([], proposal_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<(), StoreError> {
        let commit = commit.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let p = &commit.proposal;

            let changed = tx.execute(
                r#"
                UPDATE proposals
                SET state = ?3, council_id = ?4, holder_unit = ?5, holder_user = ?6,
                    sla_started_at = ?7, sla_deadline = ?8, pre_pause_state = ?9,
                    pre_pause_holder_unit = ?10, pre_pause_holder_user = ?11, paused_at = ?12,
                    expected_resume_at = ?13, return_target_state = ?14, version = ?15,
                    updated_at = ?16, title = ?17
                WHERE id = ?1 AND version = ?2
                "#,
                params![
                    p.id.to_string(),
                    commit.expected_version,
                    p.state.as_str(),
                    p.council_id,
                    p.holder_unit,
                    p.holder_user,
                    p.sla_started_at.map(|t| t.to_rfc3339()),
                    p.sla_deadline.map(|t| t.to_rfc3339()),
                    p.pre_pause_state.map(|s| s.as_str()),
                    p.pre_pause_holder_unit,
                    p.pre_pause_holder_user,
                    p.paused_at.map(|t| t.to_rfc3339()),
                    p.expected_resume_at.map(|d| d.to_string()),
                    p.return_target_state.map(|s| s.as_str()),
                    p.version,
                    p.updated_at.to_rfc3339(),
                    p.title,
                ],
            )?;

            if changed == 0 {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM proposals WHERE id = ?1)",
                    params![p.id.to_string()],
                    |row| row.get(0),
                )?;
                return Err(if exists {
                    StoreError::VersionConflict {
                        proposal_id: p.id,
                        expected: commit.expected_version,
                    }
                } else {
                    StoreError::Missing {
                        entity: "proposal",
                        id: p.id.to_string(),
                    }
                });
            }

            let log = &commit.log;
            let metadata = log.metadata.as_ref().map(serde_json::to_string).transpose()?;
            tx.execute(
                &format!(
                    "INSERT INTO workflow_logs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    LOG_COLUMNS
                ),
                params![
                    log.id.to_string(),
                    log.proposal_id.to_string(),
                    log.action.as_str(),
                    log.actor_id,
                    log.actor_name,
                    log.previous_state.as_str(),
                    log.new_state.as_str(),
                    log.timestamp.to_rfc3339(),
                    log.comment,
                    log.reason,
                    metadata,
                ],
            )?;

            if let Some(done) = &commit.completion {
                tx.execute(
                    "UPDATE idempotency_records SET status = ?3, result_json = ?4 \
                     WHERE scope = ?1 AND key = ?2 AND status = 'IN_PROGRESS'",
                    params![
                        done.scope,
                        done.key,
                        IdempotencyStatus::Completed.as_str(),
                        serde_json::to_string(&done.result)?,
                    ],
                )?;
            }

            tx.commit()?;
            debug!(proposal_id = %p.id, version = p.version, "committed transition");
            Ok(())
        })
        .await
    }

    async fn workflow_log(&self, proposal_id: Uuid) -> Result<Vec<WorkflowLogEntry>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM workflow_logs WHERE proposal_id = ?1 ORDER BY seq",
                LOG_COLUMNS
            ))?;
            let rows = stmt.query_map(params![proposal_id.to_string()], log_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn last_log_for(
        &self,
        proposal_id: Uuid,
        action: WorkflowAction,
    ) -> Result<Option<WorkflowLogEntry>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM workflow_logs WHERE proposal_id = ?1 AND action = ?2 \
                         ORDER BY seq DESC LIMIT 1",
                        LOG_COLUMNS
                    ),
                    params![proposal_id.to_string(), action.as_str()],
                    log_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn upsert_council(&self, council: &Council) -> Result<(), StoreError> {
        let council = council.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO councils (id, name, council_type, secretary_id)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                  name = excluded.name,
                  council_type = excluded.council_type,
                  secretary_id = excluded.secretary_id
                "#,
                params![
                    council.id,
                    council.name,
                    council.council_type.as_str(),
                    council.secretary_id
                ],
            )?;
            tx.execute(
                "DELETE FROM council_members WHERE council_id = ?1",
                params![council.id],
            )?;
            for member in &council.members {
                tx.execute(
                    "INSERT INTO council_members (council_id, user_id, display_name, role) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![council.id, member.user_id, member.display_name, member.role.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_council(&self, id: &str) -> Result<Option<Council>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let council = conn
                .query_row(
                    "SELECT id, name, council_type, secretary_id FROM councils WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Council {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            council_type: parse_col(row, 2)?,
                            secretary_id: row.get(3)?,
                            members: Vec::new(),
                        })
                    },
                )
                .optional()?;

            let Some(mut council) = council else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT user_id, display_name, role FROM council_members \
                 WHERE council_id = ?1 ORDER BY user_id",
            )?;
            let members = stmt.query_map(params![council.id], |row| {
                Ok(CouncilMember {
                    user_id: row.get(0)?,
                    display_name: row.get(1)?,
                    role: parse_col(row, 2)?,
                })
            })?;
            council.members = members.collect::<Result<Vec<_>, _>>()?;
            Ok(Some(council))
        })
        .await
    }

    async fn calendar_entries(&self) -> Result<Vec<CalendarEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, name, is_holiday, is_working_day, recurring \
                 FROM business_calendar ORDER BY date",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(CalendarEntry {
                    date: parse_col(row, 0)?,
                    name: row.get(1)?,
                    is_holiday: row.get(2)?,
                    is_working_day: row.get(3)?,
                    recurring: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn upsert_calendar_entry(&self, entry: &CalendarEntry) -> Result<(), StoreError> {
        let entry = entry.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO business_calendar (date, name, is_holiday, is_working_day, recurring)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(date) DO UPDATE SET
                  name = excluded.name,
                  is_holiday = excluded.is_holiday,
                  is_working_day = excluded.is_working_day,
                  recurring = excluded.recurring
                "#,
                params![
                    entry.date.to_string(),
                    entry.name,
                    entry.is_holiday,
                    entry.is_working_day,
                    entry.recurring
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_calendar_entry(&self, date: NaiveDate) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM business_calendar WHERE date = ?1",
                params![date.to_string()],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl IdempotencyStore for SqliteStore {
    async fn try_claim(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> Result<Claim, StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "DELETE FROM idempotency_records WHERE scope = ?1 AND key = ?2 AND expires_at_ms <= ?3",
                params![record.scope, record.key, now.timestamp_millis()],
            )?;

            let existing = tx
                .query_row(
                    "SELECT scope, key, fingerprint, status, result_json, created_at_ms, expires_at_ms \
                     FROM idempotency_records WHERE scope = ?1 AND key = ?2",
                    params![record.scope, record.key],
                    record_from_row,
                )
                .optional()?;

            if let Some(existing) = existing {
                tx.commit()?;
                return Ok(Claim::Existing(existing));
            }

            tx.execute(
                "INSERT INTO idempotency_records \
                 (scope, key, fingerprint, status, result_json, created_at_ms, expires_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
                params![
                    record.scope,
                    record.key,
                    record.fingerprint,
                    record.status.as_str(),
                    record.created_at.timestamp_millis(),
                    record.expires_at.timestamp_millis(),
                ],
            )?;
            tx.commit()?;
            Ok(Claim::Acquired)
        })
        .await
    }

    async fn lookup(
        &self,
        scope: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let scope = scope.to_string();
        let key = key.to_string();
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT scope, key, fingerprint, status, result_json, created_at_ms, expires_at_ms \
                     FROM idempotency_records WHERE scope = ?1 AND key = ?2 AND expires_at_ms > ?3",
                    params![scope, key, now.timestamp_millis()],
                    record_from_row,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn finish(
        &self,
        scope: &str,
        key: &str,
        status: IdempotencyStatus,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let scope = scope.to_string();
        let key = key.to_string();
        let body = serde_json::to_string(result)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE idempotency_records SET status = ?3, result_json = ?4 \
                 WHERE scope = ?1 AND key = ?2 AND status = 'IN_PROGRESS'",
                params![scope, key, status.as_str(), body],
            )?;
            if changed == 0 {
                let already: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM idempotency_records \
                     WHERE scope = ?1 AND key = ?2 AND status = ?3)",
                    params![scope, key, status.as_str()],
                    |row| row.get(0),
                )?;
                if already {
                    return Ok(());
                }
                return Err(StoreError::Missing {
                    entity: "in-progress idempotency record",
                    id: format!("{}/{}", scope, key),
                });
            }
            Ok(())
        })
        .await
    }

    async fn release(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        let scope = scope.to_string();
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM idempotency_records \
                 WHERE scope = ?1 AND key = ?2 AND status = 'IN_PROGRESS'",
                params![scope, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM idempotency_records WHERE expires_at_ms <= ?1",
                params![now.timestamp_millis()],
            )?;
            Ok(removed)
        })
        .await
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Read a TEXT column through `FromStr`
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(idx, format!("{:?}: {}", raw, e)))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|e| conversion_error(idx, format!("{:?}: {}", value, e)))
    })
    .transpose()
}

fn millis_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| conversion_error(idx, format!("timestamp out of range: {}", ms)))
}

fn json_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| serde_json::from_str(&value).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn proposal_from_row(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: parse_col(row, 0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        state: parse_col(row, 3)?,
        owner_id: row.get(4)?,
        faculty_id: row.get(5)?,
        council_id: row.get(6)?,
        holder_unit: row.get(7)?,
        holder_user: row.get(8)?,
        sla_started_at: parse_opt_col(row, 9)?,
        sla_deadline: parse_opt_col(row, 10)?,
        pre_pause_state: parse_opt_col(row, 11)?,
        pre_pause_holder_unit: row.get(12)?,
        pre_pause_holder_user: row.get(13)?,
        paused_at: parse_opt_col(row, 14)?,
        expected_resume_at: parse_opt_col(row, 15)?,
        return_target_state: parse_opt_col(row, 16)?,
        version: row.get(17)?,
        created_at: parse_col(row, 18)?,
        updated_at: parse_col(row, 19)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<WorkflowLogEntry> {
    Ok(WorkflowLogEntry {
        id: parse_col(row, 0)?,
        proposal_id: parse_col(row, 1)?,
        action: parse_col(row, 2)?,
        actor_id: row.get(3)?,
        actor_name: row.get(4)?,
        previous_state: parse_col(row, 5)?,
        new_state: parse_col(row, 6)?,
        timestamp: parse_col(row, 7)?,
        comment: row.get(8)?,
        reason: row.get(9)?,
        metadata: json_col(row, 10)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<IdempotencyRecord> {
    Ok(IdempotencyRecord {
        scope: row.get(0)?,
        key: row.get(1)?,
        fingerprint: row.get(2)?,
        status: parse_col(row, 3)?,
        result: json_col(row, 4)?,
        created_at: millis_col(row, 5)?,
        expires_at: millis_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, CouncilMemberRole, CouncilType, ProposalState, Role};
    use crate::store::SlotCompletion;

    #[tokio::test]
    async fn test_proposal_round_trip_keeps_optional_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut proposal = Proposal::new_draft("DT-5", "Mangrove carbon", "u-1", "fac-env", Utc::now());
        proposal.expected_resume_at = NaiveDate::from_ymd_opt(2026, 12, 1);
        proposal.return_target_state = Some(ProposalState::OutlineCouncilReview);
        store.insert_proposal(&proposal).await.unwrap();

        let loaded = store.get_proposal(proposal.id).await.unwrap().unwrap();
        assert_eq!(loaded, proposal);
    }

    #[tokio::test]
    async fn test_stale_commit_is_a_version_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let proposal = Proposal::new_draft("DT-6", "Flood maps", "u-1", "fac-env", Utc::now());
        store.insert_proposal(&proposal).await.unwrap();

        let actor = Actor::new("u-1", "Owner", Role::Lecturer);
        let log = WorkflowLogEntry::new(
            proposal.id,
            WorkflowAction::Submit,
            &actor,
            ProposalState::Draft,
            ProposalState::FacultyReview,
            Utc::now(),
        )
        .with_metadata(Some(serde_json::json!({ "note": "first" })));

        let mut next = proposal.clone();
        next.state = ProposalState::FacultyReview;
        let commit = TransitionCommit::new(next, log);

        store.commit_transition(&commit).await.unwrap();
        let err = store.commit_transition(&commit).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let logs = store.workflow_log(proposal.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].metadata, Some(serde_json::json!({ "note": "first" })));
    }

    #[tokio::test]
    async fn test_commit_completes_idempotency_slot() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let proposal = Proposal::new_draft("DT-7", "Tidal energy", "u-1", "fac-env", now);
        store.insert_proposal(&proposal).await.unwrap();

        let slot = IdempotencyRecord::in_progress("workflow:SUBMIT", "k-1", "fp", now, chrono::Duration::hours(24));
        assert_eq!(store.try_claim(&slot, now).await.unwrap(), Claim::Acquired);

        let actor = Actor::new("u-1", "Owner", Role::Lecturer);
        let log = WorkflowLogEntry::new(
            proposal.id,
            WorkflowAction::Submit,
            &actor,
            ProposalState::Draft,
            ProposalState::FacultyReview,
            now,
        );
        let mut next = proposal.clone();
        next.state = ProposalState::FacultyReview;
        let body = serde_json::json!({ "current_state": "FACULTY_REVIEW" });
        let commit = TransitionCommit::new(next, log).with_completion(SlotCompletion {
            scope: "workflow:SUBMIT".into(),
            key: "k-1".into(),
            result: body.clone(),
        });
        store.commit_transition(&commit).await.unwrap();

        let record = store.lookup("workflow:SUBMIT", "k-1", now).await.unwrap().unwrap();
        assert_eq!(record.status, IdempotencyStatus::Completed);
        assert_eq!(record.result, Some(body.clone()));

        // A late finish with the same status is accepted as already done
        store
            .finish("workflow:SUBMIT", "k-1", IdempotencyStatus::Completed, &body)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_council_members_replaced_on_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut council = Council {
            id: "c-1".into(),
            name: "Biology outline council".into(),
            council_type: CouncilType::Outline,
            secretary_id: Some("s-1".into()),
            members: vec![CouncilMember {
                user_id: "s-1".into(),
                display_name: "Secretary".into(),
                role: CouncilMemberRole::Secretary,
            }],
        };
        store.upsert_council(&council).await.unwrap();

        council.members.push(CouncilMember {
            user_id: "m-1".into(),
            display_name: "Member".into(),
            role: CouncilMemberRole::Member,
        });
        store.upsert_council(&council).await.unwrap();

        let loaded = store.get_council("c-1").await.unwrap().unwrap();
        assert_eq!(loaded.members.len(), 2);
        assert!(store.get_council("c-404").await.unwrap().is_none());
    }
}
