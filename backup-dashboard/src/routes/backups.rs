use crate::error::AppError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use backup_core::{Backup, BackupId, CreateBackupRequest};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_backups).post(create_backup))
        .route("/{id}", get(get_backup).delete(delete_backup))
        .route("/{id}/restore", post(restore_backup))
}

async fn list_backups(State(state): State<Arc<AppState>>) -> Json<Vec<Backup>> {
    Json(state.orchestrator.list_backups().await)
}

async fn get_backup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Backup>, AppError> {
    let backup = state.orchestrator.get_backup(BackupId(id)).await?;
    Ok(Json(backup))
}

/// The body is optional; an empty one creates a full backup with a generated name.
async fn create_backup(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateBackupRequest::default()
    } else {
        serde_json::from_slice::<CreateBackupRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?
    };

    let id = state.orchestrator.create_backup_with(request).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id }))))
}

async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let operation_id = state.orchestrator.restore_backup(BackupId(id)).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "operation_id": operation_id }))))
}

async fn delete_backup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let operation_id = state.orchestrator.delete_backup(BackupId(id)).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "operation_id": operation_id }))))
}
