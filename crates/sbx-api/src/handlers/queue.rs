//! `GET /api/v1/queue/status/` and `GET /api/v1/task/<id>/queue/`
//! (spec §4.7), grounded on `at-bridge/http_api/queue.rs`'s queue-snapshot
//! handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use sbx_core::error::AdmissionError;

use crate::auth::AuthedCredential;
use crate::envelope::{ok, ApiError};
use crate::state::ApiState;
use crate::types::{QueuePositionResponse, QueueStatusResponse, QueuedEntry, RunningEntry};

pub async fn queue_status(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(_credential): AuthedCredential,
) -> Result<Response, ApiError> {
    let queued = state
        .store
        .tasks
        .list_queued()
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;
    let running = state
        .store
        .tasks
        .list_running()
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;

    let body = QueueStatusResponse {
        queued_count: queued.len(),
        running_count: running.len(),
        queued: queued
            .into_iter()
            .map(|t| QueuedEntry {
                task_id: t.id,
                purl: t.purl,
                queue_position: t.queue_position,
                priority: t.priority,
                queued_at: t.queued_at,
            })
            .collect(),
        running: running
            .into_iter()
            .map(|t| RunningEntry {
                task_id: t.id,
                purl: t.purl,
                started_at: t.started_at,
            })
            .collect(),
    };

    Ok(ok(body, "queue status"))
}

pub async fn task_queue_position(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(credential): AuthedCredential,
    Path(task_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let task = state
        .store
        .tasks
        .get_task(task_id)
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?
        .ok_or_else(|| AdmissionError::NotFound("task not found".into()))?;

    if task.credential_id != credential.id {
        return Err(AdmissionError::NotFound("task not found".into()).into());
    }

    Ok(ok(
        QueuePositionResponse {
            task_id: task.id,
            queue_position: task.queue_position,
        },
        "queue position",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use sbx_core::purl::Ecosystem;
    use sbx_core::types::{Credential, Task};
    use sbx_store::Store;
    use sbx_worker::{AdmissionController, TimeoutSupervisor};
    use tower::ServiceExt;

    async fn test_state() -> (Arc<ApiState>, Credential) {
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
        (Arc::new(ApiState::new(store, admission, timeout_supervisor)), cred)
    }

    fn router(state: Arc<ApiState>) -> Router {
        Router::new()
            .route("/api/v1/queue/status/", get(queue_status))
            .route("/api/v1/task/{id}/queue/", get(task_queue_position))
            .with_state(state)
    }

    #[tokio::test]
    async fn queue_status_reports_queued_and_running() {
        let (state, cred) = test_state().await;
        let mut task = Task::new(
            cred.id,
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            30,
            None,
        );
        state.store.tasks.insert_task(task.clone()).await.unwrap();
        state.store.tasks.enqueue(task.id).await.unwrap();
        task.status = sbx_core::types::TaskStatus::Queued;

        let app = router(state);
        let req = Request::builder()
            .uri("/api/v1/queue/status/")
            .header("X-API-Key", "sk-test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["queued_count"], 1);
    }
}
