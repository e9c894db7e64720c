//! Council commands.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{open_store, print_json};
use crate::domain::{Council, CouncilMember, CouncilMemberRole, CouncilType};
use crate::store::WorkflowStore;

#[derive(Subcommand, Debug)]
pub enum CouncilCommands {
    /// Create or replace a council
    Create {
        id: String,

        #[arg(long)]
        name: String,

        /// OUTLINE or ACCEPTANCE
        #[arg(long = "type", default_value = "OUTLINE")]
        council_type: CouncilType,

        /// Member as USER_ID:ROLE[:DISPLAY NAME], ROLE one of CHAIR, SECRETARY, MEMBER (repeatable)
        #[arg(long = "member", value_parser = parse_member)]
        members: Vec<CouncilMember>,
    },

    /// Show a council and its members
    Show { id: String },
}

pub async fn execute(command: CouncilCommands) -> Result<()> {
    let store = open_store()?;

    match command {
        CouncilCommands::Create {
            id,
            name,
            council_type,
            members,
        } => {
            let secretary_id = members
                .iter()
                .find(|m| m.role == CouncilMemberRole::Secretary)
                .map(|m| m.user_id.clone());

            let council = Council {
                id,
                name,
                council_type,
                secretary_id,
                members,
            };

            store.upsert_council(&council).await?;
            print_json(&council)
        }
        CouncilCommands::Show { id } => {
            let council = store
                .get_council(&id)
                .await?
                .with_context(|| format!("Council not found: {}", id))?;
            print_json(&council)
        }
    }
}

fn parse_member(raw: &str) -> Result<CouncilMember, String> {
    let mut parts = raw.splitn(3, ':');

    let user_id = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing user id in {:?}", raw))?;
    let role: CouncilMemberRole = parts
        .next()
        .ok_or_else(|| format!("missing role in {:?}", raw))?
        .trim()
        .parse()?;
    let display_name = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(user_id);

    Ok(CouncilMember {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member() {
        let m = parse_member("u-7:secretary:Dr. Lan").unwrap();
        assert_eq!(m.user_id, "u-7");
        assert_eq!(m.role, CouncilMemberRole::Secretary);
        assert_eq!(m.display_name, "Dr. Lan");

        let m = parse_member("u-8:member").unwrap();
        assert_eq!(m.display_name, "u-8");

        assert!(parse_member("u-9").is_err());
        assert!(parse_member(":chair").is_err());
        assert!(parse_member("u-9:dean").is_err());
    }
}
