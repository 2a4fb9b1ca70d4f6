//! Health check HTTP handler

use axum::{extract::State, response::IntoResponse};

use crate::web::{
    AppState,
    responses::{HealthResponse, ok},
};

/// Reports version, the playlist directory and whether a cache file exists
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let cache_present = tokio::fs::try_exists(state.catalog.store().path())
        .await
        .unwrap_or(false);

    ok(HealthResponse::healthy(
        state.catalog.streams_dir().display().to_string(),
        cache_present,
    ))
}
