//! Request/response bodies for the query API (spec component C10), kept in
//! one file the way `at-bridge`'s `http_api/types.rs` collects its wire
//! shapes separately from the handlers that produce them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sbx_core::types::{ErrorCategory, TaskStatus};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub purl: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadataResponse {
    pub filename: String,
    pub size_bytes: u64,
    pub download_url: String,
    pub folder_structure: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_metadata: Option<ReportMetadataResponse>,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub purl: String,
    pub status: TaskStatus,
    pub expected_download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_timed_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_metadata: Option<ReportMetadataResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListTasksQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskSummary>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub purl: String,
    pub status: TaskStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct QueuePositionResponse {
    pub task_id: Uuid,
    pub queue_position: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub queued_count: usize,
    pub running_count: usize,
    pub queued: Vec<QueuedEntry>,
    pub running: Vec<RunningEntry>,
}

#[derive(Debug, Serialize)]
pub struct QueuedEntry {
    pub task_id: Uuid,
    pub purl: String,
    pub queue_position: Option<i64>,
    pub priority: i32,
    pub queued_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RunningEntry {
    pub task_id: Uuid,
    pub purl: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub store_connected: bool,
}
