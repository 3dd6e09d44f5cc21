use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use backup_core::{BackupEvent, BackupId, NotificationSink};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::state::AppState;

const BROADCAST_CAPACITY: usize = 256;
const MAX_QUEUE_PER_BACKUP: usize = 100;

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: i64,
}

impl QueuedMessage {
    fn to_wire(&self) -> String {
        serde_json::json!({
            "type": self.event_type,
            "payload": self.payload,
        })
        .to_string()
    }
}

/// Forwards lifecycle events to every connected dashboard and keeps a short
/// per-backup history for clients that reconnect.
#[derive(Clone)]
pub struct UiBroadcaster {
    tx: broadcast::Sender<String>,
    queue: Arc<DashMap<BackupId, VecDeque<QueuedMessage>>>,
}

impl UiBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            queue: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn broadcast(&self, backup_id: BackupId, event_type: &str, payload: Value) {
        let message = QueuedMessage {
            event_type: event_type.to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let wire = message.to_wire();

        {
            let mut entry = self.queue.entry(backup_id).or_default();
            entry.push_back(message);
            if entry.len() > MAX_QUEUE_PER_BACKUP {
                entry.pop_front();
            }
        }

        let _ = self.tx.send(wire);
    }

    /// Messages for `backup_id` queued strictly after `since` (unix millis).
    pub fn get_queued_messages(&self, backup_id: BackupId, since: i64) -> Vec<QueuedMessage> {
        self.queue
            .get(&backup_id)
            .map(|q| q.iter().filter(|m| m.timestamp > since).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for UiBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for UiBroadcaster {
    fn emit(&self, event: BackupEvent) {
        match serde_json::to_value(&event) {
            Ok(payload) => self.broadcast(event.backup_id, event.topic(), payload),
            Err(e) => tracing::warn!(topic = event.topic(), error = %e, "Dropping unserializable event"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum ClientMessage {
    #[serde(rename = "replay:request")]
    ReplayRequest {
        backup_id: BackupId,
        #[serde(default)]
        since: i64,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ui_socket(socket, state))
}

async fn handle_ui_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ui.subscribe();
    let (replay_tx, mut replay_rx) = mpsc::channel::<String>(32);

    // Forward broadcasts, and replays meant only for this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "UI client lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                replay = replay_rx.recv() => match replay {
                    Some(msg) => msg,
                    None => break,
                },
            };
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages from client (e.g., replay:request)
    let ui = state.ui.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::ReplayRequest { backup_id, since }) => {
                    for m in ui.get_queued_messages(backup_id, since) {
                        if replay_tx.send(m.to_wire()).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring client message"),
            }
        }
    });

    // Wait for either task to finish, or for the server to shut down
    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut recv_task => {},
        _ = state.shutdown.cancelled() => {},
    }
    send_task.abort();
    recv_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_core::{EventKind, EventPayload, OperationKind};
    use uuid::Uuid;

    fn event(backup_id: u64, operation: OperationKind, kind: EventKind) -> BackupEvent {
        BackupEvent {
            operation_id: Uuid::new_v4(),
            backup_id: BackupId(backup_id),
            operation,
            kind,
            payload: EventPayload::Empty,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_emit_broadcasts_wire_message() {
        let ui = UiBroadcaster::new();
        let mut rx = ui.subscribe();

        ui.emit(event(1, OperationKind::Delete, EventKind::Started));

        let wire: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(wire["type"], "backup.deleted.started");
        assert_eq!(wire["payload"]["backup_id"], 1);
    }

    #[test]
    fn test_replay_queue_per_backup() {
        let ui = UiBroadcaster::new();
        ui.emit(event(1, OperationKind::Create, EventKind::Started));
        ui.emit(event(2, OperationKind::Restore, EventKind::Started));
        ui.emit(event(1, OperationKind::Create, EventKind::Progress));

        let queued = ui.get_queued_messages(BackupId(1), 0);
        let types: Vec<_> = queued.iter().map(|m| m.event_type.as_str()).collect();
        assert_eq!(types, vec!["backup.created", "backup.progress"]);
        assert!(ui.get_queued_messages(BackupId(3), 0).is_empty());
        assert!(ui.get_queued_messages(BackupId(1), i64::MAX).is_empty());
    }

    #[test]
    fn test_queue_is_bounded() {
        let ui = UiBroadcaster::new();
        for _ in 0..(MAX_QUEUE_PER_BACKUP + 10) {
            ui.emit(event(1, OperationKind::Create, EventKind::Progress));
        }
        assert_eq!(ui.get_queued_messages(BackupId(1), 0).len(), MAX_QUEUE_PER_BACKUP);
    }

    #[test]
    fn test_parse_replay_request() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"replay:request","payload":{"backup_id":4,"since":10}}"#,
        )
        .unwrap();
        let ClientMessage::ReplayRequest { backup_id, since } = msg;
        assert_eq!(backup_id, BackupId(4));
        assert_eq!(since, 10);
    }
}
