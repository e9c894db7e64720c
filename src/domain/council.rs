//! Reviewing councils and their members.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stage a council reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilType {
    Outline,
    Acceptance,
}

impl CouncilType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outline => "OUTLINE",
            Self::Acceptance => "ACCEPTANCE",
        }
    }
}

impl FromStr for CouncilType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OUTLINE" => Ok(Self::Outline),
            "ACCEPTANCE" => Ok(Self::Acceptance),
            other => Err(format!("unknown council type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilMemberRole {
    Chair,
    Secretary,
    Member,
}

impl CouncilMemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chair => "CHAIR",
            Self::Secretary => "SECRETARY",
            Self::Member => "MEMBER",
        }
    }
}

impl fmt::Display for CouncilMemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CouncilMemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CHAIR" => Ok(Self::Chair),
            "SECRETARY" => Ok(Self::Secretary),
            "MEMBER" => Ok(Self::Member),
            other => Err(format!("unknown council member role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilMember {
    pub user_id: String,
    pub display_name: String,
    pub role: CouncilMemberRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Council {
    pub id: String,
    pub name: String,
    pub council_type: CouncilType,

    /// Declared secretary; must also appear in `members` with the SECRETARY role
    pub secretary_id: Option<String>,

    pub members: Vec<CouncilMember>,
}

impl Council {
    /// Members holding the SECRETARY role
    pub fn secretaries(&self) -> impl Iterator<Item = &CouncilMember> {
        self.members
            .iter()
            .filter(|m| m.role == CouncilMemberRole::Secretary)
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}
