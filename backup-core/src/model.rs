//! Backup records and the rules governing how they change.

use crate::utils::errors::{CoreError, Result};
use crate::utils::format::{format_duration, format_ratio, format_size};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a backup record, unique within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(pub u64);

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BackupId {
    fn from(value: u64) -> Self {
        BackupId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BackupStatus {
    pub const ALL: [BackupStatus; 4] = [
        BackupStatus::Pending,
        BackupStatus::InProgress,
        BackupStatus::Completed,
        BackupStatus::Failed,
    ];

    /// Completed and Failed are never left once reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, BackupStatus::Completed | BackupStatus::Failed)
    }

    /// Whether `self -> next` is a forward edge of the status machine.
    pub fn can_transition_to(self, next: BackupStatus) -> bool {
        use BackupStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Failed) | (InProgress, Completed) | (InProgress, Failed)
        )
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupStatus::Pending => write!(f, "Pending"),
            BackupStatus::InProgress => write!(f, "In Progress"),
            BackupStatus::Completed => write!(f, "Completed"),
            BackupStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    #[default]
    Full,
    Incremental,
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupType::Full => write!(f, "Full"),
            BackupType::Incremental => write!(f, "Incremental"),
        }
    }
}

/// Metrics gathered while a backup runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupDetails {
    pub duration_secs: u64,
    pub file_count: u64,
    /// Fraction of the original size saved by compression, 0.0 to 1.0.
    pub compression_ratio: f64,
}

impl BackupDetails {
    pub fn new(duration_secs: u64, file_count: u64, compression_ratio: f64) -> Self {
        Self {
            duration_secs,
            file_count,
            compression_ratio,
        }
    }

    pub fn duration_display(&self) -> String {
        format_duration(self.duration_secs)
    }

    pub fn compression_display(&self) -> String {
        format_ratio(self.compression_ratio)
    }

    /// Returns the name of the first metric that is lower in `self` than in `previous`.
    fn first_decrease(&self, previous: &BackupDetails) -> Option<String> {
        if self.duration_secs < previous.duration_secs {
            return Some(format!(
                "duration_secs {} -> {}",
                previous.duration_secs, self.duration_secs
            ));
        }
        if self.file_count < previous.file_count {
            return Some(format!(
                "file_count {} -> {}",
                previous.file_count, self.file_count
            ));
        }
        if self.compression_ratio < previous.compression_ratio {
            return Some(format!(
                "compression_ratio {} -> {}",
                previous.compression_ratio, self.compression_ratio
            ));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub name: String,
    pub status: BackupStatus,
    #[serde(rename = "type")]
    pub kind: BackupType,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BackupDetails>,
}

impl Backup {
    /// A freshly allocated record with zeroed metrics.
    pub fn pending(
        id: BackupId,
        name: impl Into<String>,
        kind: BackupType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            status: BackupStatus::Pending,
            kind,
            size_bytes: 0,
            created_at,
            details: Some(BackupDetails::default()),
        }
    }

    pub fn size_display(&self) -> String {
        format_size(self.size_bytes)
    }

    /// Apply `patch` in place, or leave the record untouched and return the
    /// rule it would break.
    pub fn apply(&mut self, patch: &BackupPatch) -> Result<()> {
        let status_changes = patch.status.is_some_and(|s| s != self.status);
        let size_changes = patch.size_bytes.is_some_and(|s| s != self.size_bytes);
        let details_change = patch
            .details
            .as_ref()
            .is_some_and(|d| Some(d) != self.details.as_ref());

        if self.status.is_terminal() {
            if status_changes || size_changes || details_change {
                return Err(CoreError::Terminal(self.id));
            }
            return Ok(());
        }

        if let Some(next) = patch.status {
            if status_changes && !self.status.can_transition_to(next) {
                return Err(CoreError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
        }

        if let Some(size) = patch.size_bytes {
            if size < self.size_bytes {
                return Err(CoreError::NonMonotonic(format!(
                    "size_bytes {} -> {}",
                    self.size_bytes, size
                )));
            }
        }

        if let (Some(next), Some(current)) = (&patch.details, &self.details) {
            if let Some(metric) = next.first_decrease(current) {
                return Err(CoreError::NonMonotonic(metric));
            }
        }

        if let Some(size) = patch.size_bytes {
            self.size_bytes = size;
        }
        if let Some(details) = &patch.details {
            self.details = Some(details.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }
}

/// Partial update applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupPatch {
    pub status: Option<BackupStatus>,
    pub size_bytes: Option<u64>,
    pub details: Option<BackupDetails>,
}

impl BackupPatch {
    pub fn status(status: BackupStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn metrics(size_bytes: u64, details: BackupDetails) -> Self {
        Self {
            status: None,
            size_bytes: Some(size_bytes),
            details: Some(details),
        }
    }

    pub fn with_status(mut self, status: BackupStatus) -> Self {
        self.status = Some(status);
        self
    }
}
