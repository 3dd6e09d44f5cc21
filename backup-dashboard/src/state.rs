use crate::config::AppConfig;
use crate::ws::ui::UiBroadcaster;
use backup_core::Orchestrator;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    pub ui: UiBroadcaster,
    /// Cancelled on shutdown so long-lived WebSocket connections let go.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, orchestrator: Orchestrator, ui: UiBroadcaster) -> Self {
        Self {
            config,
            orchestrator,
            ui,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }
}
