//! Custom error types for the backup core.

use crate::model::{BackupId, BackupStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A creation is already running, or the target is in a state that
    /// forbids the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backup not found: {0}")]
    NotFound(BackupId),

    #[error("Backup {id} cannot be restored while {status}")]
    NotRestorable { id: BackupId, status: BackupStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: BackupStatus, to: BackupStatus },

    #[error("Metric would decrease: {0}")]
    NonMonotonic(String),

    #[error("Backup {0} is in a terminal state")]
    Terminal(BackupId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
