// HTTP request handlers
use crate::infrastructure::http_response::{accepts_brotli, error_response, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Snapshot of every measurement type for one station
pub async fn get_snapshot(
    Path(station_id): Path<i32>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);

    match state
        .snapshot_service
        .build_snapshot(station_id, Utc::now())
        .await
    {
        Ok(snapshot) => match json_response(&snapshot, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => {
            tracing::warn!("Snapshot request failed: {}", e);
            error_response(&e)
        }
    }
}
