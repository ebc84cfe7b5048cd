use crate::{AppState, error::AppError};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use core_types::Forecast;
use forecast_store::SnapshotId;
use pipeline::SchedulerStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    limit: usize,
}
fn default_limit() -> usize { 30 }

/// A persisted forecast together with the snapshot it was read from.
#[derive(Debug, Serialize)]
pub struct SnapshotEntry {
    pub snapshot: SnapshotId,
    #[serde(flatten)]
    pub forecast: Forecast,
}

/// # GET /api/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.get_status().await)
}

/// # GET /api/forecasts
/// Retained snapshots, newest first. Unreadable ones are left out.
pub async fn get_forecasts(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<SnapshotEntry>>, AppError> {
    let store = state.scheduler.pipeline().store();
    let ids = store.list().await?;

    let mut entries = Vec::new();
    for snapshot in ids.into_iter().rev().take(pagination.limit) {
        match store.read(&snapshot).await {
            Ok(forecast) => entries.push(SnapshotEntry { snapshot, forecast }),
            Err(e) => {
                tracing::warn!(snapshot = %snapshot, error = %e, "[API] Skipping unreadable snapshot.");
            }
        }
    }
    Ok(Json(entries))
}

/// # GET /api/forecasts/latest
pub async fn get_latest_forecast(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SnapshotEntry>, AppError> {
    match state.scheduler.pipeline().store().latest().await? {
        Some((snapshot, forecast)) => Ok(Json(SnapshotEntry { snapshot, forecast })),
        None => Err(AppError::NotFound("No forecast has been generated yet".to_string())),
    }
}

/// # POST /api/cycles
/// Starts a cycle in the background. Rejected while another one is running.
pub async fn start_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match state.scheduler.spawn_cycle() {
        Some(_) => {
            tracing::info!("[API] On-demand forecast cycle started.");
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))))
        }
        None => Err(AppError::CycleInProgress),
    }
}
