use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::purl::Ecosystem;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns `true` when a transition from `self` to `target` is valid.
    /// `pending -> failed` is the one admission-error shortcut; every other
    /// edge follows the straight-line lifecycle, never backward.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Pending, TaskStatus::Queued)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Queued, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "queued" => Some(TaskStatus::Queued),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorCategory — the stored, wire-visible error taxonomy (spec §7)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    DockerImageError,
    DockerError,
    CommandNotFound,
    TimeoutError,
    PermissionError,
    AnalysisError,
    ResultParsingError,
    ResultFileError,
    UnknownError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::DockerImageError => "docker_image_error",
            ErrorCategory::DockerError => "docker_error",
            ErrorCategory::CommandNotFound => "command_not_found",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::PermissionError => "permission_error",
            ErrorCategory::AnalysisError => "analysis_error",
            ErrorCategory::ResultParsingError => "result_parsing_error",
            ErrorCategory::ResultFileError => "result_file_error",
            ErrorCategory::UnknownError => "unknown_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub credential_id: Uuid,

    pub purl: String,
    pub package_name: String,
    pub package_version: String,
    pub ecosystem: Ecosystem,
    pub idempotency_key: Option<String>,

    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub queue_position: Option<i64>,
    pub priority: i32,

    pub timeout_minutes: i64,
    pub container_id: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,

    pub report_id: Option<Uuid>,
    pub download_url: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

impl Task {
    pub fn new(
        credential_id: Uuid,
        purl: String,
        package_name: String,
        package_version: String,
        ecosystem: Ecosystem,
        priority: i32,
        timeout_minutes: i64,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential_id,
            purl,
            package_name,
            package_version,
            ecosystem,
            idempotency_key,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            queue_position: None,
            priority,
            timeout_minutes,
            container_id: None,
            last_heartbeat: None,
            report_id: None,
            download_url: None,
            error_category: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.started_at
            .map(|started| started + chrono::Duration::minutes(self.timeout_minutes))
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, TaskStatus::Running)
            && self.deadline().is_some_and(|d| now > d)
    }

    pub fn remaining_time_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline()
            .map(|d| (d - now).num_minutes())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub ecosystem: Ecosystem,
    pub package_name: String,
    pub package_version: String,
    pub duration_seconds: f64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Replace path separators so a package name can be used as a filesystem
/// path component (scoped npm names like `@angular/core` contain `/`).
pub fn sanitize_name(name: &str) -> String {
    name.replace('/', "_").replace('\\', "_")
}

/// Canonical relative path under the media root, e.g.
/// `reports/pypi/requests/2.28.1.json`. Shared by the report writer and the
/// predicted-URL builder so the two can never drift apart.
pub fn canonical_relative_path(ecosystem: Ecosystem, package_name: &str, version: &str) -> String {
    format!(
        "reports/{}/{}/{}.json",
        ecosystem.as_str(),
        sanitize_name(package_name),
        version
    )
}

/// Join a configured media base (e.g. `http://127.0.0.1:8080/media`) with the
/// canonical relative path, for both the worker's completed-report writer and
/// the admission controller's predicted-URL response field.
pub fn canonical_download_url(
    media_base_url: &str,
    ecosystem: Ecosystem,
    package_name: &str,
    version: &str,
) -> String {
    format!(
        "{}/{}",
        media_base_url.trim_end_matches('/'),
        canonical_relative_path(ecosystem, package_name, version)
    )
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    pub rate_limit_per_hour: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(key: String, label: impl Into<String>, rate_limit_per_hour: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            label: label.into(),
            rate_limit_per_hour,
            is_active: true,
            created_at: Utc::now(),
            last_used: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_go_forward_only() {
        assert!(TaskStatus::Pending.can_transition_to(&TaskStatus::Queued));
        assert!(TaskStatus::Pending.can_transition_to(&TaskStatus::Failed));
        assert!(TaskStatus::Queued.can_transition_to(&TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(&TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(&TaskStatus::Failed));

        assert!(!TaskStatus::Completed.can_transition_to(&TaskStatus::Queued));
        assert!(!TaskStatus::Failed.can_transition_to(&TaskStatus::Running));
        assert!(!TaskStatus::Queued.can_transition_to(&TaskStatus::Pending));
        assert!(!TaskStatus::Running.can_transition_to(&TaskStatus::Queued));
    }

    #[test]
    fn sanitizes_scoped_npm_name_for_path() {
        assert_eq!(sanitize_name("@angular/core"), "@angular_core");
        assert_eq!(
            canonical_relative_path(Ecosystem::Npm, "@angular/core", "12.3.1"),
            "reports/npm/@angular_core/12.3.1.json"
        );
    }

    #[test]
    fn builds_download_url_from_media_base() {
        let url = canonical_download_url(
            "http://127.0.0.1:8080/media/",
            Ecosystem::Pypi,
            "django",
            "1.11.1",
        );
        assert_eq!(url, "http://127.0.0.1:8080/media/reports/pypi/django/1.11.1.json");
    }

    #[test]
    fn deadline_and_timeout_detection() {
        let mut t = Task::new(
            Uuid::new_v4(),
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            1,
            None,
        );
        assert!(t.deadline().is_none());
        t.status = TaskStatus::Running;
        t.started_at = Some(Utc::now() - chrono::Duration::minutes(5));
        assert!(t.is_timed_out(Utc::now()));
    }
}
