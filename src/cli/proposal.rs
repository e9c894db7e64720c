//! Proposal commands: create, show, log, list.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use super::{open_orchestrator, open_store, print_envelope, print_json, ActorArgs};
use crate::core::{available_actions, can_perform, ActionResponse};
use crate::domain::{Actor, Role};
use crate::store::WorkflowStore;

#[derive(Subcommand, Debug)]
pub enum ProposalCommands {
    /// Create a proposal in DRAFT owned by the acting user
    Create {
        /// Unique proposal code, e.g. DT-2026-014
        #[arg(long)]
        code: String,

        #[arg(long)]
        title: String,

        /// Faculty the proposal belongs to
        #[arg(long)]
        faculty: String,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Show a proposal and the actions its state allows
    Show {
        id: Uuid,

        /// Only list actions this user may perform (requires --role)
        #[arg(long = "as", requires = "role")]
        actor_id: Option<String>,

        #[arg(long)]
        role: Option<Role>,
    },

    /// Print the workflow log of a proposal, oldest first
    Log { id: Uuid },

    /// List all proposals
    List,
}

pub async fn execute(command: ProposalCommands) -> Result<()> {
    match command {
        ProposalCommands::Create {
            code,
            title,
            faculty,
            actor,
        } => {
            let orchestrator = open_orchestrator()?;
            let result = orchestrator
                .create_proposal(&code, &title, &actor.actor(), &faculty)
                .await;
            print_envelope(&ActionResponse::from(result))
        }
        ProposalCommands::Show { id, actor_id, role } => {
            let orchestrator = open_orchestrator()?;
            let proposal = match orchestrator.proposal(id).await {
                Ok(p) => p,
                Err(e) => return print_envelope(&ActionResponse::<()>::failed(&e)),
            };

            let actions: Vec<_> = match (actor_id, role) {
                (Some(actor_id), Some(role)) => {
                    let actor = Actor::new(actor_id.clone(), actor_id, role);
                    available_actions(proposal.state)
                        .into_iter()
                        .filter(|a| can_perform(&proposal, *a, &actor))
                        .collect()
                }
                _ => available_actions(proposal.state),
            };

            print_json(&json!({
                "proposal": proposal,
                "available_actions": actions,
            }))
        }
        ProposalCommands::Log { id } => {
            let orchestrator = open_orchestrator()?;
            let result = orchestrator.workflow_log(id).await;
            print_envelope(&ActionResponse::from(result))
        }
        ProposalCommands::List => {
            let store = open_store()?;
            let proposals = store.list_proposals().await?;

            if proposals.is_empty() {
                eprintln!("No proposals.");
                return Ok(());
            }

            for p in proposals {
                println!(
                    "{}  {:<16} {:<28} v{:<3} {}",
                    p.id,
                    p.code,
                    p.state.as_str(),
                    p.version,
                    p.sla_deadline
                        .map(|d| format!("due {}", d.format("%Y-%m-%d %H:%M")))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}
