//! `GET /healthz` (spec §4.10), unauthenticated, grounded on
//! `at-bridge/http_api/misc.rs`'s health handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::ApiState;
use crate::types::HealthResponse;

pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let store_connected = state.store.credentials.get_by_key("").await.is_ok();
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        store_connected,
    })
}
