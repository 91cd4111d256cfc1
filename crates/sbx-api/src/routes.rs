//! Router assembly, grounded on `at-bridge/http_api/mod.rs`'s
//! `api_router_with_auth`: route registrations, then a `merge`, then
//! middleware layered bottom-up, then `with_state`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{analyze, health, queue, tasks, timeout};
use crate::state::ApiState;

/// Build the full router. Every route but `/healthz` runs through the
/// `AuthedCredential` extractor inside its own handler, so there is no
/// separate auth `Layer` to register here.
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/analyze/", post(analyze::submit))
        .route("/api/v1/task/{id}/", get(tasks::task_status))
        .route("/api/v1/reports/", get(tasks::list_tasks))
        .route("/api/v1/queue/status/", get(queue::queue_status))
        .route("/api/v1/task/{id}/queue/", get(queue::task_queue_position))
        .route("/api/v1/timeout/status/", get(timeout::timeout_status))
        .route("/api/v1/timeout/check/", post(timeout::check_timeouts))
        .route("/healthz", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                ]),
        )
        .with_state(state)
}
