//! Read-only summaries derived from a store snapshot.
//!
//! Nothing here keeps state; callers pass the current `list()` and get a
//! fresh projection back.

use crate::model::{Backup, BackupStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Count of backups per status. Every status is present, possibly with zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDistribution(BTreeMap<BackupStatus, usize>);

impl StatusDistribution {
    pub fn count(&self, status: BackupStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BackupStatus, usize)> + '_ {
        self.0.iter().map(|(status, count)| (*status, *count))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketBy {
    Day,
    #[default]
    Month,
    Year,
}

impl BucketBy {
    fn label(self, at: DateTime<Utc>) -> String {
        let pattern = match self {
            BucketBy::Day => "%Y-%m-%d",
            BucketBy::Month => "%Y-%m",
            BucketBy::Year => "%Y",
        };
        at.format(pattern).to_string()
    }
}

impl FromStr for BucketBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(BucketBy::Day),
            "month" => Ok(BucketBy::Month),
            "year" => Ok(BucketBy::Year),
            other => Err(format!("unknown bucket '{other}', expected day, month or year")),
        }
    }
}

/// Total size of the backups created within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub total_bytes: u64,
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub total_bytes: u64,
    pub last_backup_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub status_distribution: StatusDistribution,
    pub storage_trend: Vec<TrendPoint>,
}

impl Aggregates {
    pub fn compute(backups: &[Backup], bucket_by: BucketBy) -> Self {
        Self {
            status_distribution: status_distribution(backups),
            storage_trend: storage_trend(backups, bucket_by),
        }
    }
}

pub fn status_distribution(backups: &[Backup]) -> StatusDistribution {
    let mut counts: BTreeMap<BackupStatus, usize> =
        BackupStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for backup in backups {
        *counts.entry(backup.status).or_insert(0) += 1;
    }
    StatusDistribution(counts)
}

/// Sizes summed per creation period, oldest period first.
pub fn storage_trend(backups: &[Backup], bucket_by: BucketBy) -> Vec<TrendPoint> {
    // Labels are zero-padded ISO prefixes, so lexical order is chronological.
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
    for backup in backups {
        *buckets.entry(bucket_by.label(backup.created_at)).or_insert(0) += backup.size_bytes;
    }
    buckets
        .into_iter()
        .map(|(period, total_bytes)| TrendPoint {
            period,
            total_bytes,
        })
        .collect()
}

pub fn overview(backups: &[Backup]) -> Overview {
    Overview {
        total: backups.len(),
        failed: backups
            .iter()
            .filter(|b| b.status == BackupStatus::Failed)
            .count(),
        in_progress: backups
            .iter()
            .filter(|b| b.status == BackupStatus::InProgress)
            .count(),
        total_bytes: backups.iter().map(|b| b.size_bytes).sum(),
        last_backup_at: backups.iter().map(|b| b.created_at).max(),
    }
}
