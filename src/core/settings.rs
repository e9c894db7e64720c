//! Tunable workflow settings.
//!
//! All fields carry serde defaults so a partial `workflow:` section in the
//! config file only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::domain::ProposalState;

/// Engine-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub sla: SlaSettings,

    #[serde(default)]
    pub idempotency: IdempotencySettings,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// SLA deadline policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSettings {
    /// Hour of day (UTC) at which a deadline falls due (default: 17)
    #[serde(default = "default_cutoff_hour")]
    pub cutoff_hour: u32,

    #[serde(default)]
    pub budgets: SlaBudgets,
}

/// Working-day budget per review state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBudgets {
    #[serde(default = "default_three")]
    pub faculty_review: u32,

    #[serde(default = "default_three")]
    pub school_selection_review: u32,

    #[serde(default = "default_five")]
    pub outline_council_review: u32,

    #[serde(default = "default_five")]
    pub changes_requested: u32,

    #[serde(default = "default_three")]
    pub faculty_acceptance_review: u32,

    #[serde(default = "default_three")]
    pub school_acceptance_review: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencySettings {
    /// Record lifetime in hours (default: 24)
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Minimum reason length for RETURN / REJECT / WITHDRAW / PAUSE (default: 5)
    #[serde(default = "default_min_reason_chars")]
    pub min_reason_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Limit for the load phase of an action (default: 5000)
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

fn default_cutoff_hour() -> u32 {
    17
}
fn default_three() -> u32 {
    3
}
fn default_five() -> u32 {
    5
}
fn default_ttl_hours() -> i64 {
    24
}
fn default_min_reason_chars() -> usize {
    5
}
fn default_load_timeout_ms() -> u64 {
    5_000
}

impl Default for SlaSettings {
    fn default() -> Self {
        Self {
            cutoff_hour: default_cutoff_hour(),
            budgets: SlaBudgets::default(),
        }
    }
}

impl Default for SlaBudgets {
    fn default() -> Self {
        Self {
            faculty_review: default_three(),
            school_selection_review: default_three(),
            outline_council_review: default_five(),
            changes_requested: default_five(),
            faculty_acceptance_review: default_three(),
            school_acceptance_review: default_three(),
        }
    }
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_reason_chars: default_min_reason_chars(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

impl SlaBudgets {
    /// Working days allowed in `state`, `None` when the state runs no clock.
    /// Never less than one day.
    pub fn budget_for(&self, state: ProposalState) -> Option<u32> {
        self.configured(state).map(|days| days.max(1))
    }

    /// Budget as configured, before the one-day floor
    pub fn configured(&self, state: ProposalState) -> Option<u32> {
        match state {
            ProposalState::FacultyReview => Some(self.faculty_review),
            ProposalState::SchoolSelectionReview => Some(self.school_selection_review),
            ProposalState::OutlineCouncilReview => Some(self.outline_council_review),
            ProposalState::ChangesRequested => Some(self.changes_requested),
            ProposalState::FacultyAcceptanceReview => Some(self.faculty_acceptance_review),
            ProposalState::SchoolAcceptanceReview => Some(self.school_acceptance_review),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_floors_at_one_day() {
        let budgets = SlaBudgets {
            faculty_review: 0,
            ..SlaBudgets::default()
        };
        assert_eq!(budgets.configured(ProposalState::FacultyReview), Some(0));
        assert_eq!(budgets.budget_for(ProposalState::FacultyReview), Some(1));
        assert_eq!(budgets.budget_for(ProposalState::Draft), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
sla:
  cutoff_hour: 16
  budgets:
    outline_council_review: 10
validation:
  min_reason_chars: 12
"#;
        let settings: WorkflowSettings = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(settings.sla.cutoff_hour, 16);
        assert_eq!(settings.sla.budgets.outline_council_review, 10);
        assert_eq!(settings.sla.budgets.faculty_review, 3);
        assert_eq!(settings.validation.min_reason_chars, 12);
        assert_eq!(settings.idempotency.ttl_hours, 24);
        assert_eq!(settings.timeouts.load_timeout_ms, 5_000);
    }

    #[test]
    fn test_budget_only_for_review_states() {
        let budgets = SlaBudgets::default();
        assert_eq!(budgets.budget_for(ProposalState::FacultyReview), Some(3));
        assert_eq!(budgets.budget_for(ProposalState::ChangesRequested), Some(5));
        assert_eq!(budgets.budget_for(ProposalState::Draft), None);
        assert_eq!(budgets.budget_for(ProposalState::Paused), None);
    }
}
