//! Staged creation pipeline.
//!
//! A [`BackupPipeline`] turns a freshly created record into a stream of
//! metric updates, one per stage. The orchestrator applies and reports each
//! update as progress, then marks the record Completed once the stream ends.
//! [`SimulatedPipeline`] stands in for a real storage backend.

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::model::{Backup, BackupDetails};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const GB: u64 = 1_000_000_000;

/// Metrics reported at the end of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    /// 1-based stage number.
    pub stage: u32,
    pub size_bytes: u64,
    pub details: BackupDetails,
}

impl StageUpdate {
    pub fn new(stage: u32, size_bytes: u64, details: BackupDetails) -> Self {
        Self {
            stage,
            size_bytes,
            details,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("simulated failure at stage {stage}")]
    SimulatedFailure { stage: u32 },

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StageStream = BoxStream<'static, Result<StageUpdate, PipelineError>>;

pub trait BackupPipeline: Send + Sync {
    /// Start producing stage updates for `backup`.
    ///
    /// The stream ends after the final stage, or right after the first error.
    fn run(&self, backup: &Backup, clock: Arc<dyn Clock>) -> StageStream;
}

/// Deterministic pipeline: a fixed list of stages, each released after
/// `stage_delay`, optionally failing at a chosen stage.
#[derive(Debug, Clone)]
pub struct SimulatedPipeline {
    stages: Vec<StageUpdate>,
    stage_delay: Duration,
    fail_at_stage: Option<u32>,
}

impl SimulatedPipeline {
    pub fn new(stage_delay: Duration) -> Self {
        Self {
            stages: Self::default_stages(),
            stage_delay,
            fail_at_stage: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            stages: Self::default_stages(),
            stage_delay: Duration::from_millis(config.stage_delay_ms),
            fail_at_stage: config.fail_at_stage,
        }
    }

    /// Three stages ending at 2.1GB, 1200 files, 15 minutes, 60% compression.
    pub fn default_stages() -> Vec<StageUpdate> {
        vec![
            StageUpdate::new(1, 8 * GB / 10, BackupDetails::new(5 * 60, 400, 0.30)),
            StageUpdate::new(2, 15 * GB / 10, BackupDetails::new(10 * 60, 800, 0.45)),
            StageUpdate::new(3, 21 * GB / 10, BackupDetails::new(15 * 60, 1200, 0.60)),
        ]
    }

    pub fn with_stages(mut self, stages: Vec<StageUpdate>) -> Self {
        self.stages = stages;
        self
    }

    pub fn failing_at(mut self, stage: u32) -> Self {
        self.fail_at_stage = Some(stage);
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_delay(&self) -> Duration {
        self.stage_delay
    }
}

impl Default for SimulatedPipeline {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

struct RunState {
    remaining: std::vec::IntoIter<StageUpdate>,
    clock: Arc<dyn Clock>,
    stage_delay: Duration,
    fail_at_stage: Option<u32>,
    halted: bool,
}

impl BackupPipeline for SimulatedPipeline {
    fn run(&self, backup: &Backup, clock: Arc<dyn Clock>) -> StageStream {
        tracing::debug!(
            backup_id = %backup.id,
            stages = self.stages.len(),
            "Starting simulated pipeline"
        );

        let state = RunState {
            remaining: self.stages.clone().into_iter(),
            clock,
            stage_delay: self.stage_delay,
            fail_at_stage: self.fail_at_stage,
            halted: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.halted {
                return None;
            }
            let update = state.remaining.next()?;
            state.clock.sleep(state.stage_delay).await;

            if state.fail_at_stage == Some(update.stage) {
                state.halted = true;
                let err = PipelineError::SimulatedFailure {
                    stage: update.stage,
                };
                return Some((Err(err), state));
            }
            Some((Ok(update), state))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::model::{BackupId, BackupType};
    use chrono::Utc;

    fn backup() -> Backup {
        Backup::pending(BackupId(1), "backup-1", BackupType::Full, Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_stages_in_order() {
        let pipeline = SimulatedPipeline::default();
        let start = tokio::time::Instant::now();
        let updates: Vec<_> = pipeline
            .run(&backup(), Arc::new(TokioClock))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].size_bytes, 800_000_000);
        assert_eq!(updates[1].details.file_count, 800);
        assert_eq!(updates[2].size_bytes, 2_100_000_000);
        assert_eq!(updates[2].details.duration_secs, 900);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_stream() {
        let pipeline = SimulatedPipeline::default().failing_at(2);
        let items: Vec<_> = pipeline
            .run(&backup(), Arc::new(TokioClock))
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(PipelineError::SimulatedFailure { stage: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_pipeline() {
        let pipeline = SimulatedPipeline::default().with_stages(Vec::new());
        let items: Vec<_> = pipeline
            .run(&backup(), Arc::new(TokioClock))
            .collect()
            .await;
        assert!(items.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig {
            stage_delay_ms: 250,
            fail_at_stage: Some(3),
        };
        let pipeline = SimulatedPipeline::from_config(&config);
        assert_eq!(pipeline.stage_delay(), Duration::from_millis(250));
        assert_eq!(pipeline.stage_count(), 3);
    }
}
