//! Command-line interface for propflow.
//!
//! Provides commands for creating proposals, performing workflow actions,
//! and managing the business calendar and reviewing councils. Everything
//! runs against the SQLite database resolved from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::core::{ActionResponse, WorkflowOrchestrator};
use crate::domain::{ActionPayload, ActionRequest, Actor, CouncilSelection, Role, WorkflowAction};
use crate::store::{IdempotencyStore, SqliteStore, WorkflowStore};

pub mod calendar;
pub mod council;
pub mod proposal;

/// propflow - Research-proposal approval workflow engine
#[derive(Parser, Debug)]
#[command(name = "propflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the state directory and database
    Init {
        /// Also load the fixed-date national holidays
        #[arg(long)]
        seed_holidays: bool,
    },

    /// Create and inspect proposals
    Proposal {
        #[command(subcommand)]
        command: proposal::ProposalCommands,
    },

    /// Perform a workflow action on a proposal
    Act {
        /// Proposal ID (UUID)
        proposal_id: Uuid,

        /// Action, e.g. submit, approve, return, assign-council, pause
        action: WorkflowAction,

        /// Idempotency key (UUIDv4); reuse it when retrying. Generated if omitted
        #[arg(short, long)]
        key: Option<String>,

        /// Reason (required for return, reject, withdraw, pause)
        #[arg(short, long)]
        reason: Option<String>,

        /// Free-text comment for the workflow log
        #[arg(short, long)]
        comment: Option<String>,

        /// Council ID for assign-council / change-council
        #[arg(long)]
        council: Option<String>,

        /// Council secretary for assign-council / change-council
        #[arg(long)]
        secretary: Option<String>,

        /// Participating council member (repeatable)
        #[arg(long = "member")]
        members: Vec<String>,

        /// Expected resume date for pause (YYYY-MM-DD)
        #[arg(long)]
        resume_on: Option<NaiveDate>,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Manage the business calendar
    Calendar {
        #[command(subcommand)]
        command: calendar::CalendarCommands,
    },

    /// Manage reviewing councils
    Council {
        #[command(subcommand)]
        command: council::CouncilCommands,
    },

    /// Idempotency record housekeeping
    Idempotency {
        #[command(subcommand)]
        command: IdempotencyCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum IdempotencyCommands {
    /// Delete expired idempotency records
    Purge,
}

/// Identity of the caller, as verified upstream
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Acting user ID
    #[arg(long = "as", env = "PROPFLOW_ACTOR")]
    pub actor_id: String,

    /// Role claim of the acting user
    #[arg(long, env = "PROPFLOW_ROLE")]
    pub role: Role,

    /// Display name recorded in the workflow log (defaults to the user ID)
    #[arg(long, env = "PROPFLOW_ACTOR_NAME")]
    pub name: Option<String>,
}

impl ActorArgs {
    pub fn actor(&self) -> Actor {
        let name = self.name.clone().unwrap_or_else(|| self.actor_id.clone());
        Actor::new(self.actor_id.clone(), name, self.role)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init { seed_holidays } => init(seed_holidays).await,
            Commands::Proposal { command } => proposal::execute(command).await,
            Commands::Act {
                proposal_id,
                action,
                key,
                reason,
                comment,
                council,
                secretary,
                members,
                resume_on,
                actor,
            } => {
                let council = match (council, secretary) {
                    (Some(council_id), Some(secretary_id)) => Some(CouncilSelection {
                        council_id,
                        secretary_id,
                        member_ids: members,
                    }),
                    (None, None) => None,
                    _ => anyhow::bail!("--council and --secretary must be given together"),
                };

                let payload = ActionPayload {
                    reason,
                    comment,
                    council,
                    expected_resume_at: resume_on,
                };

                perform_action(proposal_id, action, key, payload, actor.actor()).await
            }
            Commands::Calendar { command } => calendar::execute(command).await,
            Commands::Council { command } => council::execute(command).await,
            Commands::Idempotency {
                command: IdempotencyCommands::Purge,
            } => purge_idempotency().await,
            Commands::Config => show_config().await,
        }
    }
}

/// Open the configured SQLite database, creating its directory if needed
pub(crate) fn open_store() -> Result<Arc<SqliteStore>> {
    let path = config::database_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Build an orchestrator over the configured database
pub(crate) fn open_orchestrator() -> Result<WorkflowOrchestrator> {
    let cfg = config::config()?;
    let store = open_store()?;
    let workflow_store: Arc<dyn WorkflowStore> = store.clone();
    let idempotency_store: Arc<dyn IdempotencyStore> = store;
    Ok(WorkflowOrchestrator::new(
        workflow_store,
        idempotency_store,
        cfg.workflow.clone(),
    ))
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}

/// Print an envelope and exit non-zero when it carries an error
pub(crate) fn print_envelope<T: Serialize>(response: &ActionResponse<T>) -> Result<()> {
    print_json(response)?;
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn init(seed_holidays: bool) -> Result<()> {
    let home = config::propflow_home()?;
    std::fs::create_dir_all(&home)
        .with_context(|| format!("Failed to create home directory: {}", home.display()))?;

    let store = open_store()?;
    info!(path = %config::database_path()?.display(), "Database ready");

    if seed_holidays {
        let seeded = calendar::seed_defaults(store.as_ref()).await?;
        eprintln!("Seeded {} recurring holidays", seeded);
    }

    eprintln!("propflow initialized at {}", home.display());
    Ok(())
}

async fn perform_action(
    proposal_id: Uuid,
    action: WorkflowAction,
    key: Option<String>,
    payload: ActionPayload,
    actor: Actor,
) -> Result<()> {
    let orchestrator = open_orchestrator()?;

    let key = key.unwrap_or_else(|| Uuid::new_v4().to_string());
    eprintln!("[idempotency key {}]", key);

    let request = ActionRequest::new(proposal_id, action, key).with_payload(payload);
    let result = orchestrator.perform_action(&request, &actor).await;

    if let Ok(ref r) = result {
        if r.replayed {
            eprintln!("[replayed earlier result]");
        }
    }

    let response: ActionResponse<_> = result.map(|r| r.outcome).into();
    print_envelope(&response)
}

async fn purge_idempotency() -> Result<()> {
    let orchestrator = open_orchestrator()?;
    let removed = orchestrator.purge_expired_idempotency().await?;
    println!("Removed {} expired idempotency records (as of {})", removed, Utc::now());
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("propflow configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Database:            {}", cfg.database.display());
    println!();

    let sla = &cfg.workflow.sla;
    println!("SLA:");
    println!("  Cutoff hour (UTC):          {:02}:00", sla.cutoff_hour);
    println!("  Faculty review:             {} working days", sla.budgets.faculty_review);
    println!("  School selection review:    {} working days", sla.budgets.school_selection_review);
    println!("  Outline council review:     {} working days", sla.budgets.outline_council_review);
    println!("  Changes requested:          {} working days", sla.budgets.changes_requested);
    println!("  Faculty acceptance review:  {} working days", sla.budgets.faculty_acceptance_review);
    println!("  School acceptance review:   {} working days", sla.budgets.school_acceptance_review);
    println!();
    println!("Idempotency TTL:   {}h", cfg.workflow.idempotency.ttl_hours);
    println!("Min reason length: {} chars", cfg.workflow.validation.min_reason_chars);
    println!("Load timeout:      {}ms", cfg.workflow.timeouts.load_timeout_ms);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_parses_council_flags() {
        let cli = Cli::try_parse_from([
            "propflow",
            "act",
            "6f1f4c2e-8a7e-4c3f-9d7e-2b1a0c9d8e7f",
            "assign-council",
            "--council",
            "c-1",
            "--secretary",
            "s-1",
            "--member",
            "m-1",
            "--member",
            "m-2",
            "--as",
            "ro-1",
            "--role",
            "research_office",
        ])
        .unwrap();

        match cli.command {
            Commands::Act {
                action,
                members,
                actor,
                ..
            } => {
                assert_eq!(action, WorkflowAction::AssignCouncil);
                assert_eq!(members, vec!["m-1", "m-2"]);
                assert_eq!(actor.actor().role, Role::ResearchOffice);
                assert_eq!(actor.actor().display_name, "ro-1");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = Cli::try_parse_from([
            "propflow",
            "act",
            "6f1f4c2e-8a7e-4c3f-9d7e-2b1a0c9d8e7f",
            "submit",
            "--as",
            "u-1",
            "--role",
            "janitor",
        ]);
        assert!(result.is_err());
    }
}
