//! Sample records for a populated first render.

use backup_core::{Backup, BackupDetails, BackupId, BackupStatus, BackupType};
use chrono::{TimeZone, Utc};

struct Sample {
    id: u64,
    name: &'static str,
    status: BackupStatus,
    kind: BackupType,
    size_bytes: u64,
    created: (i32, u32, u32, u32),
    details: (u64, u64, f64),
}

const SAMPLES: &[Sample] = &[
    Sample {
        id: 1,
        name: "daily-backup-1",
        status: BackupStatus::Completed,
        kind: BackupType::Full,
        size_bytes: 2_500_000_000,
        created: (2024, 3, 10, 10),
        details: (15 * 60, 1250, 0.65),
    },
    Sample {
        id: 2,
        name: "daily-backup-2",
        status: BackupStatus::Failed,
        kind: BackupType::Full,
        size_bytes: 2_300_000_000,
        created: (2024, 3, 9, 10),
        details: (12 * 60, 1100, 0.62),
    },
    Sample {
        id: 3,
        name: "hourly-backup-1",
        status: BackupStatus::InProgress,
        kind: BackupType::Incremental,
        size_bytes: 1_200_000_000,
        created: (2024, 3, 10, 9),
        details: (8 * 60, 450, 0.58),
    },
];

pub fn sample_backups() -> Vec<Backup> {
    SAMPLES
        .iter()
        .filter_map(|s| {
            let (year, month, day, hour) = s.created;
            let created_at = Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).single()?;
            let (duration_secs, file_count, compression_ratio) = s.details;
            Some(Backup {
                id: BackupId(s.id),
                name: s.name.to_string(),
                status: s.status,
                kind: s.kind,
                size_bytes: s.size_bytes,
                created_at,
                details: Some(BackupDetails::new(duration_secs, file_count, compression_ratio)),
            })
        })
        .collect()
}
