//! Configuration for propflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PROPFLOW_HOME, PROPFLOW_DB)
//! 2. Config file (.propflow/config.yaml)
//! 3. Defaults (~/.propflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .propflow/config.yaml
//! - Paths in config file are relative to the .propflow/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::WorkflowSettings;
use crate::domain::ProposalState;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .propflow/)
    pub home: Option<String>,
    /// SQLite database file (relative to .propflow/)
    pub database: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to propflow home (engine state)
    pub home: PathBuf,
    /// Absolute path to the SQLite database
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Workflow settings (SLA, idempotency, validation, timeouts)
    pub workflow: WorkflowSettings,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".propflow").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Reject settings the engine cannot honour
fn check_settings(settings: &WorkflowSettings) -> Result<()> {
    if settings.sla.cutoff_hour > 23 {
        anyhow::bail!(
            "workflow.sla.cutoff_hour must be between 0 and 23, got {}",
            settings.sla.cutoff_hour
        );
    }
    if settings.idempotency.ttl_hours < 1 {
        anyhow::bail!(
            "workflow.idempotency.ttl_hours must be at least 1, got {}",
            settings.idempotency.ttl_hours
        );
    }
    if let Some(state) = ProposalState::ALL
        .into_iter()
        .find(|s| settings.sla.budgets.configured(*s) == Some(0))
    {
        anyhow::bail!(
            "workflow.sla.budgets.{} must be at least 1 working day",
            state.as_str().to_lowercase()
        );
    }
    if settings.timeouts.load_timeout_ms == 0 {
        anyhow::bail!("workflow.timeouts.load_timeout_ms must be positive");
    }
    Ok(())
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".propflow");

    let config_file = find_config_file();

    let (home, database, workflow) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;
        let propflow_dir = config_path.parent().unwrap_or(Path::new("."));

        let home = if let Ok(env_home) = std::env::var("PROPFLOW_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(propflow_dir, home_path)
        } else {
            default_home.clone()
        };

        let database = if let Ok(env_db) = std::env::var("PROPFLOW_DB") {
            PathBuf::from(env_db)
        } else if let Some(ref db_path) = config.paths.database {
            resolve_path(propflow_dir, db_path)
        } else {
            home.join("propflow.db")
        };

        (home, database, config.workflow)
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("PROPFLOW_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let database = std::env::var("PROPFLOW_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("propflow.db"));

        (home, database, WorkflowSettings::default())
    };

    check_settings(&workflow)?;

    Ok(ResolvedConfig {
        home,
        database,
        config_file,
        workflow,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the propflow home directory (engine state).
pub fn propflow_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the SQLite database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let propflow_dir = temp.path().join(".propflow");
        std::fs::create_dir_all(&propflow_dir).unwrap();

        let config_path = propflow_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./
  database: ./state/propflow.db
workflow:
  sla:
    cutoff_hour: 16
    budgets:
      faculty_review: 4
  idempotency:
    ttl_hours: 48
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.paths.database, Some("./state/propflow.db".to_string()));
        assert_eq!(config.workflow.sla.cutoff_hour, 16);
        assert_eq!(config.workflow.sla.budgets.faculty_review, 4);
        assert_eq!(config.workflow.sla.budgets.outline_council_review, 5);
        assert_eq!(config.workflow.idempotency.ttl_hours, 48);
        assert_eq!(config.workflow.validation.min_reason_chars, 5);
    }

    #[test]
    fn test_workflow_section_is_optional() {
        let config: ConfigFile = serde_yaml::from_str("version: \"1.0\"\n").unwrap();
        assert_eq!(config.workflow, WorkflowSettings::default());
        assert!(config.paths.database.is_none());
    }

    #[test]
    fn test_check_settings_rejects_bad_cutoff() {
        let mut settings = WorkflowSettings::default();
        assert!(check_settings(&settings).is_ok());

        settings.sla.cutoff_hour = 24;
        assert!(check_settings(&settings).is_err());
    }

    #[test]
    fn test_check_settings_rejects_zero_budget() {
        let mut settings = WorkflowSettings::default();
        settings.sla.budgets.outline_council_review = 0;

        let err = check_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("outline_council_review"), "{}", err);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.propflow");

        assert_eq!(
            resolve_path(&base, "./propflow.db"),
            PathBuf::from("/home/user/project/.propflow/./propflow.db")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path.db"),
            PathBuf::from("/absolute/path.db")
        );
    }
}
