//! `GET /api/v1/task/<id>/` and `GET /api/v1/reports/` (spec §4.6, §4.9),
//! grounded on `at-bridge/http_api`'s task-lookup handlers (fetch by id,
//! reject cross-caller access, paginate the caller's own rows).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use uuid::Uuid;

use sbx_core::error::AdmissionError;
use sbx_core::types::{canonical_download_url, TaskStatus};

use crate::auth::AuthedCredential;
use crate::envelope::{ok, ApiError};
use crate::state::ApiState;
use crate::types::{ListTasksQuery, ListTasksResponse, ReportMetadataResponse, TaskStatusResponse, TaskSummary};

pub async fn task_status(
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

    let expected_download_url = canonical_download_url(
        state.admission.media_base_url(),
        task.ecosystem,
        &task.package_name,
        &task.package_version,
    );

    let now = chrono::Utc::now();
    let (remaining_time_minutes, is_timed_out) = if task.status == TaskStatus::Running {
        (task.remaining_time_minutes(now), Some(task.is_timed_out(now)))
    } else {
        (None, None)
    };

    let report_metadata = match task.report_id {
        Some(report_id) => state
            .store
            .reports
            .get(report_id)
            .await
            .map_err(|e| AdmissionError::Internal(e.to_string()))?
            .map(|report| ReportMetadataResponse {
                filename: format!("{}.json", report.package_version),
                size_bytes: 0,
                download_url: task.download_url.clone().unwrap_or_else(|| expected_download_url.clone()),
                folder_structure: format!(
                    "reports/{}/{}/",
                    report.ecosystem.as_str(),
                    sbx_core::types::sanitize_name(&report.package_name)
                ),
            }),
        None => None,
    };

    let body = TaskStatusResponse {
        task_id: task.id,
        purl: task.purl,
        status: task.status,
        expected_download_url,
        queue_position: task.queue_position,
        remaining_time_minutes,
        is_timed_out,
        download_url: task.download_url,
        report_metadata,
        error_category: task.error_category,
        error_message: task.error_message,
        error_details: task.error_details,
    };

    Ok(ok(body, "task status"))
}

pub async fn list_tasks(
    State(state): State<Arc<ApiState>>,
    AuthedCredential(credential): AuthedCredential,
    Query(query): Query<ListTasksQuery>,
) -> Result<Response, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);
    let status = query
        .status
        .as_deref()
        .and_then(parse_status);

    let (tasks, total) = state
        .store
        .tasks
        .list_by_credential(credential.id, page, page_size, status)
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))?;

    let body = ListTasksResponse {
        tasks: tasks
            .into_iter()
            .map(|t| TaskSummary {
                task_id: t.id,
                purl: t.purl,
                status: t.status,
                created_at: t.created_at,
            })
            .collect(),
        total,
        page,
        page_size,
    };

    Ok(ok(body, "tasks listed"))
}

fn parse_status(s: &str) -> Option<TaskStatus> {
    match s {
        "pending" => Some(TaskStatus::Pending),
        "queued" => Some(TaskStatus::Queued),
        "running" => Some(TaskStatus::Running),
        "completed" => Some(TaskStatus::Completed),
        "failed" => Some(TaskStatus::Failed),
        _ => None,
    }
}
