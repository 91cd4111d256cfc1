//! `POST /api/v1/analyze/` (spec §4.5/§6), grounded on `at-bridge`'s
//! `tasks::create_task` handler shape (`State` + `Json` extractors, ad-hoc
//! response construction) but driving the admission controller instead of
//! an in-memory map.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;

use sbx_core::types::canonical_download_url;
use sbx_worker::AdmissionOutcome;

use crate::auth::AuthedCredential;
use crate::envelope::{ok_with_status, ApiError};
use crate::state::ApiState;
use crate::types::{ReportMetadataResponse, SubmitRequest, SubmitResponse};

pub async fn submit(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(credential): AuthedCredential,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let idempotency_key = headers
        .get("x-idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let outcome = state
        .admission
        .submit(&credential, &req.purl, req.priority.unwrap_or(0), idempotency_key)
        .await?;

    let media_base_url = state.admission.media_base_url().to_string();

    let (status, body) = match outcome {
        AdmissionOutcome::Completed { task, report_metadata } => (
            StatusCode::OK,
            SubmitResponse {
                task_id: task.id,
                status: task.status,
                queue_position: None,
                result_url: None,
                status_url: None,
                download_url: Some(report_metadata.download_url.clone()),
                report_metadata: Some(ReportMetadataResponse {
                    filename: report_metadata.filename,
                    size_bytes: report_metadata.size_bytes,
                    download_url: report_metadata.download_url,
                    folder_structure: report_metadata.folder_structure,
                }),
            },
        ),
        AdmissionOutcome::Existing { task } => {
            let predicted = canonical_download_url(
                &media_base_url,
                task.ecosystem,
                &task.package_name,
                &task.package_version,
            );
            (
                StatusCode::OK,
                SubmitResponse {
                    task_id: task.id,
                    status: task.status,
                    queue_position: task.queue_position,
                    result_url: Some(predicted),
                    status_url: Some(format!("/api/v1/task/{}/", task.id)),
                    download_url: None,
                    report_metadata: None,
                },
            )
        }
        AdmissionOutcome::Queued { task } => {
            let predicted = canonical_download_url(
                &media_base_url,
                task.ecosystem,
                &task.package_name,
                &task.package_version,
            );
            (
                StatusCode::ACCEPTED,
                SubmitResponse {
                    task_id: task.id,
                    status: task.status,
                    queue_position: task.queue_position,
                    result_url: Some(predicted),
                    status_url: Some(format!("/api/v1/task/{}/", task.id)),
                    download_url: None,
                    report_metadata: None,
                },
            )
        }
    };

    Ok(ok_with_status(status, body, "submission processed"))
}
