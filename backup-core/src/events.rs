//! Lifecycle events and the sink capability the orchestrator reports to.

use crate::model::{Backup, BackupDetails, BackupId};
use crate::tracker::OperationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Restore,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Restore => write!(f, "restore"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Progress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full record at the time of the transition.
    Snapshot { backup: Backup },
    Progress {
        stage: u32,
        size_bytes: u64,
        details: BackupDetails,
    },
    Failure { reason: String },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEvent {
    pub operation_id: OperationId,
    pub backup_id: BackupId,
    pub operation: OperationKind,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl BackupEvent {
    /// Dotted event name, e.g. `backup.progress` or `backup.deleted.started`.
    pub fn topic(&self) -> &'static str {
        use EventKind::*;
        use OperationKind::*;
        match (self.operation, self.kind) {
            (Create, Started) => "backup.created",
            (Create, Progress) => "backup.progress",
            (Create, Succeeded) => "backup.completed",
            (Create, Failed) => "backup.failed",
            (Restore, Started) => "backup.restore.started",
            (Restore, Progress) => "backup.restore.progress",
            (Restore, Succeeded) => "backup.restore.succeeded",
            (Restore, Failed) => "backup.restore.failed",
            (Delete, Started) => "backup.deleted.started",
            (Delete, Progress) => "backup.deleted.progress",
            (Delete, Succeeded) => "backup.deleted.succeeded",
            (Delete, Failed) => "backup.deleted.failed",
        }
    }
}

/// Receiver of lifecycle events, supplied by whoever hosts the orchestrator.
///
/// Each transition is handed to `emit` exactly once; fanning out to several
/// subscribers is the sink's business.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: BackupEvent);
}

impl<F> NotificationSink for F
where
    F: Fn(BackupEvent) + Send + Sync,
{
    fn emit(&self, event: BackupEvent) {
        self(event)
    }
}

/// Fans events out to every subscriber over a tokio broadcast channel.
///
/// Events emitted while nobody is subscribed are dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<BackupEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for BroadcastSink {
    fn emit(&self, event: BackupEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<BackupEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BackupEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.events().iter().map(BackupEvent::topic).collect()
    }

    pub fn for_backup(&self, backup_id: BackupId) -> Vec<BackupEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.backup_id == backup_id)
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn emit(&self, event: BackupEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn event(operation: OperationKind, kind: EventKind) -> BackupEvent {
        BackupEvent {
            operation_id: Uuid::new_v4(),
            backup_id: BackupId(1),
            operation,
            kind,
            payload: EventPayload::Empty,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_topics() {
        assert_eq!(event(OperationKind::Create, EventKind::Started).topic(), "backup.created");
        assert_eq!(event(OperationKind::Create, EventKind::Progress).topic(), "backup.progress");
        assert_eq!(event(OperationKind::Create, EventKind::Succeeded).topic(), "backup.completed");
        assert_eq!(event(OperationKind::Create, EventKind::Failed).topic(), "backup.failed");
        assert_eq!(
            event(OperationKind::Delete, EventKind::Started).topic(),
            "backup.deleted.started"
        );
        assert_eq!(
            event(OperationKind::Delete, EventKind::Succeeded).topic(),
            "backup.deleted.succeeded"
        );
    }

    #[tokio::test]
    async fn test_broadcast_fans_out() {
        let sink = BroadcastSink::new();
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();

        sink.emit(event(OperationKind::Restore, EventKind::Started));

        assert_eq!(a.recv().await.unwrap().topic(), "backup.restore.started");
        assert_eq!(b.recv().await.unwrap().topic(), "backup.restore.started");
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let sink = move |_event: BackupEvent| {
            *counter.lock().unwrap() += 1;
        };
        sink.emit(event(OperationKind::Delete, EventKind::Started));
        sink.emit(event(OperationKind::Delete, EventKind::Succeeded));
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(event(OperationKind::Create, EventKind::Started)).unwrap();
        assert_eq!(json["backup_id"], 1);
        assert_eq!(json["operation"], "create");
        assert_eq!(json["payload"]["type"], "empty");
    }
}
