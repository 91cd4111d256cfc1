//! `GET /api/v1/timeout/status/` and `POST /api/v1/timeout/check/`
//! (spec §4.8), grounded on `queue_manager.py`'s `get_timeout_status`/
//! `check_timeouts` as already ported into `TimeoutSupervisor`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use sbx_core::error::AdmissionError;

use crate::auth::AuthedCredential;
use crate::envelope::{ok, ApiError};
use crate::state::ApiState;

pub async fn timeout_status(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(_credential): AuthedCredential,
) -> Result<Response, ApiError> {
    let status = state
        .timeout_supervisor
        .status()
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;
    Ok(ok(status, "timeout status"))
}

#[derive(Debug, Serialize)]
pub struct CheckTimeoutsResponse {
    pub tasks_timed_out: usize,
}

pub async fn check_timeouts(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(_credential): AuthedCredential,
) -> Result<Response, ApiError> {
    let handled = state
        .timeout_supervisor
        .check_once()
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;
    Ok(ok(CheckTimeoutsResponse { tasks_timed_out: handled }, "timeout check complete"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use sbx_core::types::Credential;
    use sbx_store::Store;
    use sbx_worker::{AdmissionController, TimeoutSupervisor};
    use tower::ServiceExt;

    async fn test_state() -> Arc<ApiState> {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory(dir.path()).await.unwrap());
        let cred = Credential::new("sk-test".into(), "ci", 1000);
        store.credentials.insert(cred.clone()).await.unwrap();
        let admission = Arc::new(AdmissionController::new(store.clone(), 24, 30, "http://x/media"));
        let containers: Arc<dyn sbx_worker::ContainerSupervisor> = Arc::new(sbx_worker::DockerContainerSupervisor);
        let timeout_supervisor = Arc::new(TimeoutSupervisor::new(
            store.clone(),
            containers,
            std::time::Duration::from_secs(10),
        ));
        Arc::new(ApiState::new(store, admission, timeout_supervisor))
    }

    fn router(state: Arc<ApiState>) -> Router {
        Router::new()
            .route("/api/v1/timeout/status/", get(timeout_status))
            .route("/api/v1/timeout/check/", post(check_timeouts))
            .with_state(state)
    }

    #[tokio::test]
    async fn timeout_status_with_no_running_tasks() {
        let state = test_state().await;
        let app = router(state);
        let req = Request::builder()
            .uri("/api/v1/timeout/status/")
            .header("X-API-Key", "sk-test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["running_tasks"], 0);
    }

    #[tokio::test]
    async fn check_timeouts_with_nothing_to_do() {
        let state = test_state().await;
        let app = router(state);
        let req = Request::builder()
            .uri("/api/v1/timeout/check/")
            .method("POST")
            .header("X-API-Key", "sk-test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["tasks_timed_out"], 0);
    }
}
