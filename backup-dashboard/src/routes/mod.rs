pub mod backups;
pub mod health;
pub mod stats;

use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use backup_core::OperationInfo;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/backups", backups::router())
        .nest("/api/stats", stats::router())
        .route("/api/operations", get(list_operations))
        .route("/health", get(health::health))
        .route("/ws", get(crate::ws::ui::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_operations(State(state): State<Arc<AppState>>) -> Json<Vec<OperationInfo>> {
    Json(state.orchestrator.operations())
}
