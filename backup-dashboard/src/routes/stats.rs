use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use backup_core::aggregate::{self, Aggregates};
use backup_core::{BucketBy, Overview, StatusDistribution, TrendPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_stats))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub bucket: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub status_distribution: StatusDistribution,
    pub storage_trend: Vec<TrendPoint>,
    pub overview: Overview,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let bucket_by = match query.bucket.as_deref() {
        Some(raw) => raw.parse::<BucketBy>().map_err(AppError::BadRequest)?,
        None => BucketBy::default(),
    };

    // One snapshot so the three views agree with each other.
    let backups = state.orchestrator.list_backups().await;
    let aggregates = Aggregates::compute(&backups, bucket_by);
    let overview = aggregate::overview(&backups);
    Ok(Json(StatsResponse {
        status_distribution: aggregates.status_distribution,
        storage_trend: aggregates.storage_trend,
        overview,
    }))
}
