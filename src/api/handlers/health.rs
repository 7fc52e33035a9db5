use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use crate::state::AppState;

/// Liveness plus a cheap store round-trip, bounded like every other store call.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match tokio::time::timeout(state.config.store_timeout, state.event_repo.count()).await {
        Ok(Ok(_)) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        _ => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unavailable" }))),
    }
}
