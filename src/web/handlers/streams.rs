//! Stream catalog HTTP handlers
//!
//! Bodies are the catalog JSON as-is; provenance travels in headers.

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::errors::{AppError, AppResult};
use crate::services::CatalogPayload;
use crate::web::{AppState, handle_error};

const JSON_UTF8: &str = "application/json; charset=utf-8";

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");
pub const CACHE_PERSISTED_HEADER: HeaderName = HeaderName::from_static("x-cache-persisted");
pub const STREAMS_PROBED_HEADER: HeaderName = HeaderName::from_static("x-streams-probed");
pub const STREAMS_AVAILABLE_HEADER: HeaderName = HeaderName::from_static("x-streams-available");

/// `GET /api/streams`: cached catalog, or a fresh aggregation on a miss
pub async fn list_streams(State(state): State<AppState>) -> Response {
    respond(state.catalog.streams().await)
}

/// `GET /api/resync`: aggregate, validate and rewrite the cache
///
/// The pass runs on its own task so it still writes the cache when the
/// client disconnects before it finishes.
pub async fn resync_streams(State(state): State<AppState>) -> Response {
    let catalog = state.catalog.clone();
    let pass = tokio::spawn(async move { catalog.resync().await });
    respond(pass.await.map_err(AppError::from).and_then(|result| result))
}

fn respond(result: AppResult<CatalogPayload>) -> Response {
    match result {
        Ok(payload) => json_payload(payload),
        Err(e) => {
            error!("Stream catalog request failed: {}", e);
            handle_error(e)
        }
    }
}

fn json_payload(payload: CatalogPayload) -> Response {
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8))],
        payload.body,
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(payload.source.as_str()),
    );
    if let Some(persisted) = payload.persisted {
        let value = if persisted { "true" } else { "false" };
        headers.insert(CACHE_PERSISTED_HEADER, HeaderValue::from_static(value));
    }
    if let Some(summary) = payload.validation {
        headers.insert(STREAMS_PROBED_HEADER, HeaderValue::from(summary.probed));
        headers.insert(STREAMS_AVAILABLE_HEADER, HeaderValue::from(summary.available));
    }

    response
}
