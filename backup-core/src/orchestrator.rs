//! Backup lifecycle orchestration.
//!
//! The [`Orchestrator`] owns the record store and drives the three
//! operations against it:
//!
//! - **create**: single-flight. Inserts a Pending record, moves it to
//!   InProgress, and runs the pipeline stages in a background task, ending in
//!   Completed or Failed.
//! - **restore**: leaves the record untouched; reports start and, after the
//!   restore delay, success.
//! - **delete**: the record stays listed until the confirmation delay has
//!   elapsed, then it is removed.
//!
//! Precondition failures are returned to the caller. Anything that goes wrong
//! after the call has returned is only visible through the record status and
//! the events handed to the [`NotificationSink`].

use crate::aggregate::{self, Aggregates, BucketBy, Overview};
use crate::clock::{Clock, TokioClock};
use crate::config::{Config, OperationsConfig};
use crate::events::{BackupEvent, EventKind, EventPayload, NotificationSink, OperationKind};
use crate::model::{Backup, BackupId, BackupPatch, BackupStatus, BackupType};
use crate::pipeline::{BackupPipeline, SimulatedPipeline, StageUpdate};
use crate::store::BackupStore;
use crate::tracker::{OperationId, OperationInfo, OperationTracker};
use crate::utils::errors::{CoreError, Result};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub restore_delay: Duration,
    pub delete_confirm_delay: Duration,
    pub restore_requires_completed: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &OperationsConfig) -> Self {
        Self {
            restore_delay: Duration::from_millis(config.restore_delay_ms),
            delete_confirm_delay: Duration::from_millis(config.delete_confirm_delay_ms),
            restore_requires_completed: config.restore_requires_completed,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&OperationsConfig::default())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBackupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: BackupType,
}

/// Held by the running creation; dropping it reopens the slot.
struct CreationGuard {
    slot: Arc<AtomicBool>,
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

type PendingDeletes = Arc<Mutex<HashMap<BackupId, OperationId>>>;

fn lock_pending(pending: &PendingDeletes) -> MutexGuard<'_, HashMap<BackupId, OperationId>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by a running deletion; dropping it clears the pending entry, also
/// when the task is aborted.
struct PendingDelete {
    pending: PendingDeletes,
    id: BackupId,
}

impl Drop for PendingDelete {
    fn drop(&mut self) {
        lock_pending(&self.pending).remove(&self.id);
    }
}

struct Inner {
    store: BackupStore,
    sink: Arc<dyn NotificationSink>,
    pipeline: Arc<dyn BackupPipeline>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    tracker: OperationTracker,
    creating: Arc<AtomicBool>,
    pending_deletes: PendingDeletes,
}

pub struct OrchestratorBuilder {
    store: BackupStore,
    sink: Arc<dyn NotificationSink>,
    pipeline: Option<Arc<dyn BackupPipeline>>,
    clock: Option<Arc<dyn Clock>>,
    settings: OrchestratorSettings,
}

impl OrchestratorBuilder {
    pub fn pipeline(mut self, pipeline: Arc<dyn BackupPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(Inner {
                store: self.store,
                sink: self.sink,
                pipeline: self
                    .pipeline
                    .unwrap_or_else(|| Arc::new(SimulatedPipeline::default())),
                clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
                settings: self.settings,
                tracker: OperationTracker::new(),
                creating: Arc::new(AtomicBool::new(false)),
                pending_deletes: Arc::new(Mutex::new(HashMap::new())),
            }),
        }
    }
}

/// Cloneable handle; clones share the same store, guard and tracker.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(store: BackupStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self::builder(store, sink).build()
    }

    pub fn builder(store: BackupStore, sink: Arc<dyn NotificationSink>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            sink,
            pipeline: None,
            clock: None,
            settings: OrchestratorSettings::default(),
        }
    }

    /// Orchestrator with a simulated pipeline and delays taken from `config`.
    pub fn from_config(config: &Config, store: BackupStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self::builder(store, sink)
            .pipeline(Arc::new(SimulatedPipeline::from_config(&config.pipeline)))
            .settings(OrchestratorSettings::from_config(&config.operations))
            .build()
    }

    pub fn store(&self) -> &BackupStore {
        &self.inner.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Start a full backup with a generated name.
    pub async fn create_backup(&self) -> Result<BackupId> {
        self.create_backup_with(CreateBackupRequest::default()).await
    }

    /// Start a backup; fails with `Conflict` while another creation runs.
    ///
    /// The only await is the store insert. Once it completes, the record is
    /// InProgress and its task is spawned before this returns, so dropping
    /// the future early leaves either nothing behind or a driven backup.
    pub async fn create_backup_with(&self, request: CreateBackupRequest) -> Result<BackupId> {
        let guard = self.claim_creation()?;
        let inner = &self.inner;

        let now = inner.clock.now();
        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("backup-{}", now.timestamp_millis()));
        let (created, backup) = inner
            .store
            .insert_new(
                |id| Backup::pending(id, name, request.kind, now),
                &BackupPatch::status(BackupStatus::InProgress),
            )
            .await?;
        let id = backup.id;
        let operation_id = Uuid::new_v4();

        info!(backup_id = %id, name = %backup.name, kind = %backup.kind, "Backup creation started");
        self.emit(
            operation_id,
            id,
            OperationKind::Create,
            EventKind::Started,
            EventPayload::Snapshot { backup: created },
        );

        let this = self.clone();
        let info = OperationInfo {
            id: operation_id,
            kind: OperationKind::Create,
            backup_id: id,
            started_at: now,
        };
        inner.tracker.spawn(info, async move {
            this.drive_creation(operation_id, backup).await;
            drop(guard);
        });

        Ok(id)
    }

    /// Restore a backup. The record itself is not modified.
    pub async fn restore_backup(&self, id: BackupId) -> Result<OperationId> {
        let inner = &self.inner;
        let backup = inner.store.get(id).await.ok_or(CoreError::NotFound(id))?;

        if inner.settings.restore_requires_completed && backup.status != BackupStatus::Completed {
            warn!(backup_id = %id, status = %backup.status, "Restore rejected");
            return Err(CoreError::NotRestorable {
                id,
                status: backup.status,
            });
        }

        let operation_id = Uuid::new_v4();
        info!(backup_id = %id, name = %backup.name, "Restore started");
        self.emit(
            operation_id,
            id,
            OperationKind::Restore,
            EventKind::Started,
            EventPayload::Snapshot { backup },
        );

        let this = self.clone();
        let info = OperationInfo {
            id: operation_id,
            kind: OperationKind::Restore,
            backup_id: id,
            started_at: inner.clock.now(),
        };
        inner.tracker.spawn(info, async move {
            this.inner
                .clock
                .sleep(this.inner.settings.restore_delay)
                .await;

            if this.inner.store.contains(id).await {
                info!(backup_id = %id, "Restore succeeded");
                this.emit(
                    operation_id,
                    id,
                    OperationKind::Restore,
                    EventKind::Succeeded,
                    EventPayload::Empty,
                );
            } else {
                warn!(backup_id = %id, "Backup removed while restoring");
                this.emit(
                    operation_id,
                    id,
                    OperationKind::Restore,
                    EventKind::Failed,
                    EventPayload::Failure {
                        reason: format!("backup {id} was removed during restore"),
                    },
                );
            }
        });

        Ok(operation_id)
    }

    /// Delete a backup after the confirmation delay.
    ///
    /// Rejected with `Conflict` while a creation is still driving the backup.
    /// Repeating the call while the deletion is pending returns the pending
    /// operation's id and emits nothing.
    pub async fn delete_backup(&self, id: BackupId) -> Result<OperationId> {
        let inner = &self.inner;
        let already_pending = lock_pending(&inner.pending_deletes).get(&id).copied();
        if let Some(operation_id) = already_pending {
            debug!(backup_id = %id, "Delete already pending");
            return Ok(operation_id);
        }

        let backup = inner.store.get(id).await.ok_or(CoreError::NotFound(id))?;
        if inner.tracker.find(OperationKind::Create, id).is_some() {
            warn!(backup_id = %id, status = %backup.status, "Delete rejected");
            return Err(CoreError::Conflict(format!(
                "backup {id} is still being created; it can be deleted once it has finished"
            )));
        }

        let operation_id = Uuid::new_v4();
        let pending = {
            let mut pending = lock_pending(&inner.pending_deletes);
            if let Some(existing) = pending.get(&id) {
                return Ok(*existing);
            }
            pending.insert(id, operation_id);
            PendingDelete {
                pending: inner.pending_deletes.clone(),
                id,
            }
        };

        info!(backup_id = %id, name = %backup.name, "Delete started");
        self.emit(
            operation_id,
            id,
            OperationKind::Delete,
            EventKind::Started,
            EventPayload::Snapshot { backup },
        );

        let this = self.clone();
        let info = OperationInfo {
            id: operation_id,
            kind: OperationKind::Delete,
            backup_id: id,
            started_at: inner.clock.now(),
        };
        inner.tracker.spawn(info, async move {
            this.inner
                .clock
                .sleep(this.inner.settings.delete_confirm_delay)
                .await;

            let removed = if this.inner.tracker.find(OperationKind::Create, id).is_some() {
                Err(CoreError::Conflict(format!("backup {id} is still being created")))
            } else {
                this.inner.store.remove(id).await
            };
            drop(pending);

            match removed {
                Ok(_) => {
                    info!(backup_id = %id, "Delete succeeded");
                    this.emit(
                        operation_id,
                        id,
                        OperationKind::Delete,
                        EventKind::Succeeded,
                        EventPayload::Empty,
                    );
                }
                Err(e) => {
                    warn!(backup_id = %id, error = %e, "Delete failed");
                    this.emit(
                        operation_id,
                        id,
                        OperationKind::Delete,
                        EventKind::Failed,
                        EventPayload::Failure {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        });

        Ok(operation_id)
    }

    /// All backups, newest first.
    pub async fn list_backups(&self) -> Vec<Backup> {
        self.inner.store.list().await
    }

    pub async fn get_backup(&self, id: BackupId) -> Result<Backup> {
        self.inner.store.get(id).await.ok_or(CoreError::NotFound(id))
    }

    pub async fn aggregates(&self, bucket_by: BucketBy) -> Aggregates {
        Aggregates::compute(&self.inner.store.list().await, bucket_by)
    }

    pub async fn overview(&self) -> Overview {
        aggregate::overview(&self.inner.store.list().await)
    }

    pub fn is_creating(&self) -> bool {
        self.inner.creating.load(Ordering::Acquire)
    }

    /// Operations that have started and not yet reported a terminal event.
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.inner.tracker.list()
    }

    /// Abandon every in-flight operation. Nothing is rolled back.
    pub fn shutdown(&self) -> usize {
        let aborted = self.inner.tracker.abort_all();
        if aborted > 0 {
            warn!(aborted, "Abandoned in-flight backup operations");
        }
        aborted
    }

    fn claim_creation(&self) -> Result<CreationGuard> {
        self.inner
            .creating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("Backup creation rejected: another creation is in progress");
                CoreError::Conflict("a backup creation is already in progress".into())
            })?;
        Ok(CreationGuard {
            slot: self.inner.creating.clone(),
        })
    }

    async fn drive_creation(&self, operation_id: OperationId, backup: Backup) {
        let id = backup.id;
        let mut stages = self
            .inner
            .pipeline
            .run(&backup, self.inner.clock.clone());

        while let Some(next) = stages.next().await {
            let outcome = match next {
                Ok(update) => self.apply_stage(operation_id, id, update).await,
                Err(e) => Err(e.to_string()),
            };
            if let Err(reason) = outcome {
                self.fail_creation(operation_id, id, reason).await;
                return;
            }
        }

        match self
            .inner
            .store
            .update(id, &BackupPatch::status(BackupStatus::Completed))
            .await
        {
            Ok(backup) => {
                info!(
                    backup_id = %id,
                    size = %backup.size_display(),
                    "Backup completed"
                );
                self.emit(
                    operation_id,
                    id,
                    OperationKind::Create,
                    EventKind::Succeeded,
                    EventPayload::Snapshot { backup },
                );
            }
            Err(e) => self.fail_creation(operation_id, id, e.to_string()).await,
        }
    }

    async fn apply_stage(
        &self,
        operation_id: OperationId,
        id: BackupId,
        update: StageUpdate,
    ) -> std::result::Result<(), String> {
        let patch = BackupPatch::metrics(update.size_bytes, update.details.clone());
        self.inner
            .store
            .update(id, &patch)
            .await
            .map_err(|e| e.to_string())?;

        debug!(
            backup_id = %id,
            stage = update.stage,
            size_bytes = update.size_bytes,
            files = update.details.file_count,
            "Backup stage finished"
        );
        self.emit(
            operation_id,
            id,
            OperationKind::Create,
            EventKind::Progress,
            EventPayload::Progress {
                stage: update.stage,
                size_bytes: update.size_bytes,
                details: update.details,
            },
        );
        Ok(())
    }

    async fn fail_creation(&self, operation_id: OperationId, id: BackupId, reason: String) {
        warn!(backup_id = %id, reason = %reason, "Backup failed");
        if let Err(e) = self
            .inner
            .store
            .update(id, &BackupPatch::status(BackupStatus::Failed))
            .await
        {
            error!(backup_id = %id, error = %e, "Could not mark backup as failed");
        }
        self.emit(
            operation_id,
            id,
            OperationKind::Create,
            EventKind::Failed,
            EventPayload::Failure { reason },
        );
    }

    fn emit(
        &self,
        operation_id: OperationId,
        backup_id: BackupId,
        operation: OperationKind,
        kind: EventKind,
        payload: EventPayload,
    ) {
        self.inner.sink.emit(BackupEvent {
            operation_id,
            backup_id,
            operation,
            kind,
            payload,
            timestamp: self.inner.clock.now(),
        });
    }
}
