//! Tracking of in-flight asynchronous operations.

use crate::events::OperationKind;
use crate::model::BackupId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use uuid::Uuid;

pub type OperationId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationInfo {
    pub id: OperationId,
    pub kind: OperationKind,
    pub backup_id: BackupId,
    pub started_at: DateTime<Utc>,
}

struct TrackedOperation {
    info: OperationInfo,
    handle: AbortHandle,
}

/// Tracks running operations and provides an abort mechanism
#[derive(Clone)]
pub struct OperationTracker {
    operations: Arc<Mutex<HashMap<OperationId, TrackedOperation>>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self {
            operations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationId, TrackedOperation>> {
        self.operations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `task` and track it until it finishes.
    ///
    /// Registration happens under the lock before the task can reach
    /// `complete`, so a task that finishes immediately still removes its own
    /// entry. Nothing here awaits: once called, the task is running.
    pub fn spawn<F>(&self, info: OperationInfo, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut operations = self.lock();
        let tracker = self.clone();
        let id = info.id;
        let handle = tokio::spawn(async move {
            task.await;
            tracker.complete(&id);
        });
        operations.insert(
            id,
            TrackedOperation {
                info,
                handle: handle.abort_handle(),
            },
        );
    }

    /// Abort everything still running; returns how many were aborted
    pub fn abort_all(&self) -> usize {
        let mut operations = self.lock();
        let count = operations.len();
        for (_, op) in operations.drain() {
            op.handle.abort();
        }
        count
    }

    /// Remove an operation from tracking (called when it completes naturally)
    pub fn complete(&self, id: &OperationId) {
        self.lock().remove(id);
    }

    /// The running operation of `kind` that targets `backup_id`, if any.
    pub fn find(&self, kind: OperationKind, backup_id: BackupId) -> Option<OperationInfo> {
        self.lock()
            .values()
            .find(|op| op.info.kind == kind && op.info.backup_id == backup_id)
            .map(|op| op.info.clone())
    }

    pub fn running_count(&self) -> usize {
        self.lock().len()
    }

    /// Running operations, oldest first.
    pub fn list(&self) -> Vec<OperationInfo> {
        let mut infos: Vec<_> = self.lock().values().map(|op| op.info.clone()).collect();
        infos.sort_by_key(|info| info.started_at);
        infos
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn info(kind: OperationKind) -> OperationInfo {
        OperationInfo {
            id: Uuid::new_v4(),
            kind,
            backup_id: BackupId(1),
            started_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_and_untracks() {
        let tracker = OperationTracker::new();
        tracker.spawn(info(OperationKind::Restore), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
        });
        assert_eq!(tracker.running_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(tracker.running_count(), 0);
    }

    #[tokio::test]
    async fn test_immediate_task_untracks() {
        let tracker = OperationTracker::new();
        tracker.spawn(info(OperationKind::Delete), async {});
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tracker.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_by_kind_and_backup() {
        let tracker = OperationTracker::new();
        let op = info(OperationKind::Create);
        let id = op.id;
        tracker.spawn(op, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        assert_eq!(tracker.find(OperationKind::Create, BackupId(1)).map(|o| o.id), Some(id));
        assert!(tracker.find(OperationKind::Delete, BackupId(1)).is_none());
        assert!(tracker.find(OperationKind::Create, BackupId(2)).is_none());
        assert_eq!(tracker.list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all() {
        let tracker = OperationTracker::new();
        for _ in 0..3 {
            tracker.spawn(info(OperationKind::Restore), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
        assert_eq!(tracker.abort_all(), 3);
        assert_eq!(tracker.running_count(), 0);
    }
}
