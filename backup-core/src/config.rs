//! Configuration for the backup core.
//!
//! Loaded from a TOML file; every field falls back to a default so a partial
//! file (or none at all) is valid.

use crate::utils::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub operations: OperationsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Delay before each creation stage reports (milliseconds)
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,

    /// Stage at which the simulated pipeline fails, if any
    #[serde(default)]
    pub fail_at_stage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationsConfig {
    /// Time a restore takes before it reports success (milliseconds)
    #[serde(default = "default_restore_delay_ms")]
    pub restore_delay_ms: u64,

    /// Confirmation delay before a deleted backup leaves the store (milliseconds)
    #[serde(default = "default_delete_confirm_delay_ms")]
    pub delete_confirm_delay_ms: u64,

    /// Reject restores of backups that are not Completed
    #[serde(default)]
    pub restore_requires_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_stage_delay_ms() -> u64 {
    1000
}

fn default_restore_delay_ms() -> u64 {
    2000
}

fn default_delete_confirm_delay_ms() -> u64 {
    1500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay_ms(),
            fail_at_stage: None,
        }
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            restore_delay_ms: default_restore_delay_ms(),
            delete_confirm_delay_ms: default_delete_confirm_delay_ms(),
            restore_requires_completed: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.fail_at_stage == Some(0) {
            return Err(CoreError::Config(
                "pipeline.fail_at_stage is 1-based; 0 never matches a stage".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.stage_delay_ms, 1000);
        assert_eq!(config.operations.restore_delay_ms, 2000);
        assert_eq!(config.operations.delete_confirm_delay_ms, 1500);
        assert!(!config.operations.restore_requires_completed);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\nfail_at_stage = 2\n\n[operations]\nrestore_requires_completed = true"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.fail_at_stage, Some(2));
        assert_eq!(config.pipeline.stage_delay_ms, 1000);
        assert!(config.operations.restore_requires_completed);
        assert_eq!(config.operations.delete_confirm_delay_ms, 1500);
    }

    #[test]
    fn test_rejects_stage_zero() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nfail_at_stage = 0").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/backup-core.toml").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
