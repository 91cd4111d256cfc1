use chrono::{DateTime, Utc};
use rusqlite::Row;
use sbx_core::purl::Ecosystem;
use sbx_core::types::{Credential, ErrorCategory, Report, Task, TaskStatus};
use uuid::Uuid;

use crate::error::StoreError;

pub fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidRow(format!("uuid: {e}")))
}

pub fn parse_dt(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRow(format!("timestamp: {e}")))
}

pub fn parse_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(|s| parse_dt(&s)).transpose()
}

pub fn ecosystem_from_str(s: &str) -> Result<Ecosystem, StoreError> {
    match s {
        "pypi" => Ok(Ecosystem::Pypi),
        "npm" => Ok(Ecosystem::Npm),
        "rubygems" => Ok(Ecosystem::Rubygems),
        "maven" => Ok(Ecosystem::Maven),
        "packagist" => Ok(Ecosystem::Packagist),
        other => Err(StoreError::InvalidRow(format!("unknown ecosystem: {other}"))),
    }
}

pub fn status_from_str(s: &str) -> Result<TaskStatus, StoreError> {
    TaskStatus::from_str_loose(s).ok_or_else(|| StoreError::InvalidRow(format!("unknown status: {s}")))
}

pub fn error_category_from_str(s: &str) -> Result<ErrorCategory, StoreError> {
    match s {
        "docker_image_error" => Ok(ErrorCategory::DockerImageError),
        "docker_error" => Ok(ErrorCategory::DockerError),
        "command_not_found" => Ok(ErrorCategory::CommandNotFound),
        "timeout_error" => Ok(ErrorCategory::TimeoutError),
        "permission_error" => Ok(ErrorCategory::PermissionError),
        "analysis_error" => Ok(ErrorCategory::AnalysisError),
        "result_parsing_error" => Ok(ErrorCategory::ResultParsingError),
        "result_file_error" => Ok(ErrorCategory::ResultFileError),
        "unknown_error" => Ok(ErrorCategory::UnknownError),
        other => Err(StoreError::InvalidRow(format!("unknown error category: {other}"))),
    }
}

pub fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get("id")?;
    let credential_id: String = row.get("credential_id")?;
    let purl: String = row.get("purl")?;
    let package_name: String = row.get("package_name")?;
    let package_version: String = row.get("package_version")?;
    let ecosystem: String = row.get("ecosystem")?;
    let idempotency_key: Option<String> = row.get("idempotency_key")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let queued_at: Option<String> = row.get("queued_at")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let queue_position: Option<i64> = row.get("queue_position")?;
    let priority: i32 = row.get("priority")?;
    let timeout_minutes: i64 = row.get("timeout_minutes")?;
    let container_id: Option<String> = row.get("container_id")?;
    let last_heartbeat: Option<String> = row.get("last_heartbeat")?;
    let report_id: Option<String> = row.get("report_id")?;
    let download_url: Option<String> = row.get("download_url")?;
    let error_category: Option<String> = row.get("error_category")?;
    let error_message: Option<String> = row.get("error_message")?;
    let error_details: Option<String> = row.get("error_details")?;

    let to_invalid = |e: StoreError| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(e.to_string())),
        )
    };

    Ok(Task {
        id: parse_uuid(&id).map_err(to_invalid)?,
        credential_id: parse_uuid(&credential_id).map_err(to_invalid)?,
        purl,
        package_name,
        package_version,
        ecosystem: ecosystem_from_str(&ecosystem).map_err(to_invalid)?,
        idempotency_key,
        status: status_from_str(&status).map_err(to_invalid)?,
        created_at: parse_dt(&created_at).map_err(to_invalid)?,
        queued_at: parse_opt_dt(queued_at).map_err(to_invalid)?,
        started_at: parse_opt_dt(started_at).map_err(to_invalid)?,
        completed_at: parse_opt_dt(completed_at).map_err(to_invalid)?,
        queue_position,
        priority,
        timeout_minutes,
        container_id,
        last_heartbeat: parse_opt_dt(last_heartbeat).map_err(to_invalid)?,
        report_id: report_id
            .map(|s| parse_uuid(&s))
            .transpose()
            .map_err(to_invalid)?,
        download_url,
        error_category: error_category
            .map(|s| error_category_from_str(&s))
            .transpose()
            .map_err(to_invalid)?,
        error_message,
        error_details: error_details
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| to_invalid(StoreError::Serde(e)))?,
    })
}

pub fn row_to_report(row: &Row<'_>) -> rusqlite::Result<Report> {
    let id: String = row.get("id")?;
    let ecosystem: String = row.get("ecosystem")?;
    let package_name: String = row.get("package_name")?;
    let package_version: String = row.get("package_version")?;
    let duration_seconds: f64 = row.get("duration_seconds")?;
    let payload: String = row.get("payload")?;
    let created_at: String = row.get("created_at")?;

    let to_invalid = |e: StoreError| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(e.to_string())),
        )
    };

    Ok(Report {
        id: parse_uuid(&id).map_err(to_invalid)?,
        ecosystem: ecosystem_from_str(&ecosystem).map_err(to_invalid)?,
        package_name,
        package_version,
        duration_seconds,
        payload: serde_json::from_str(&payload).map_err(|e| to_invalid(StoreError::Serde(e)))?,
        created_at: parse_dt(&created_at).map_err(to_invalid)?,
    })
}

pub fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let id: String = row.get("id")?;
    let key: String = row.get("key")?;
    let label: String = row.get("label")?;
    let rate_limit_per_hour: u32 = row.get("rate_limit_per_hour")?;
    let is_active: bool = row.get("is_active")?;
    let created_at: String = row.get("created_at")?;
    let last_used: Option<String> = row.get("last_used")?;

    let to_invalid = |e: StoreError| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(e.to_string())),
        )
    };

    Ok(Credential {
        id: parse_uuid(&id).map_err(to_invalid)?,
        key,
        label,
        rate_limit_per_hour,
        is_active,
        created_at: parse_dt(&created_at).map_err(to_invalid)?,
        last_used: parse_opt_dt(last_used).map_err(to_invalid)?,
    })
}
