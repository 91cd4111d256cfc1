//! The two error surfaces described in the design: a stable, persisted
//! taxonomy for sandbox/task failures (`ErrorCategory`, in `types.rs`, plus
//! `SandboxError` here which knows how to classify itself into one), and an
//! admission-level error returned directly to a caller without ever being
//! written to a Task row.

use serde::Serialize;

use crate::purl::PurlError;
use crate::types::ErrorCategory;

/// Errors returned by the admission controller before a Task row exists.
/// Never persisted; mapped straight to an HTTP status by the API layer.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Purl(#[from] PurlError),
    #[error("missing or invalid credential")]
    Auth,
    #[error("rate limit exceeded: max {limit} requests per hour")]
    RateLimit { limit: u32 },
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("method not allowed")]
    Method,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    /// The wire-visible category name for admission-level failures; these
    /// are returned directly, never stored on a Task.
    pub fn category(&self) -> &'static str {
        match self {
            AdmissionError::Purl(_) => "PurlError",
            AdmissionError::Auth => "AuthError",
            AdmissionError::RateLimit { .. } => "RateLimit",
            AdmissionError::NotFound(_) => "NotFound",
            AdmissionError::Method => "MethodError",
            AdmissionError::Internal(_) => "InternalError",
        }
    }
}

/// Structured detail persisted alongside a failed Task's `error_category`
/// and `error_message`. Mirrors the shape the sandbox contract's own
/// failure reporting produces (§7): a typed `error_type`, the optional
/// process exit code and captured stdio, the package triple, and — for
/// timeouts — the command that was running.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    pub package_name: String,
    pub package_version: String,
    pub ecosystem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// A classified sandbox-execution failure: the taxonomy tag plus the
/// structured detail that gets persisted onto the failed Task.
#[derive(Debug, thiserror::Error)]
#[error("{category:?}: {message}")]
pub struct SandboxError {
    pub category: ErrorCategory,
    pub message: String,
    pub details: ErrorDetails,
}

impl SandboxError {
    /// Classify a nonzero sandbox-process exit per the precedence rules
    /// observed in the original analysis runner: exit code first narrows to
    /// a small set of well-known runtime failures (125 = docker error, 127 =
    /// command not found), then stderr content disambiguates the generic
    /// exit-1 case.
    pub fn from_exit(
        exit_code: i32,
        stderr: &str,
        stdout: &str,
        package_name: &str,
        package_version: &str,
        ecosystem: &str,
        command: &str,
    ) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let category = match exit_code {
            125 => ErrorCategory::DockerError,
            127 => ErrorCategory::CommandNotFound,
            1 if stderr_lower.contains("docker")
                && (stderr_lower.contains("not found") || stderr_lower.contains("pull")) =>
            {
                ErrorCategory::DockerImageError
            }
            1 if stderr_lower.contains("timeout") => ErrorCategory::TimeoutError,
            1 if stderr_lower.contains("permission") || stderr_lower.contains("access") => {
                ErrorCategory::PermissionError
            }
            1 => ErrorCategory::AnalysisError,
            _ => ErrorCategory::UnknownError,
        };

        SandboxError {
            category,
            message: format!("analysis execution failed (exit {exit_code})"),
            details: ErrorDetails {
                error_type: "analysis_execution_failed".into(),
                exit_code: Some(exit_code),
                stderr: Some(stderr.to_string()),
                stdout: Some(stdout.to_string()),
                package_name: package_name.to_string(),
                package_version: package_version.to_string(),
                ecosystem: ecosystem.to_string(),
                command: Some(command.to_string()),
            },
        }
    }

    pub fn result_file_missing(package_name: &str, package_version: &str, ecosystem: &str) -> Self {
        SandboxError {
            category: ErrorCategory::ResultFileError,
            message: "expected sandbox result file not found".into(),
            details: ErrorDetails {
                error_type: "result_file_not_found".into(),
                exit_code: None,
                stderr: None,
                stdout: None,
                package_name: package_name.to_string(),
                package_version: package_version.to_string(),
                ecosystem: ecosystem.to_string(),
                command: None,
            },
        }
    }

    pub fn result_parse_failed(
        package_name: &str,
        package_version: &str,
        ecosystem: &str,
        parse_error: &str,
    ) -> Self {
        SandboxError {
            category: ErrorCategory::ResultParsingError,
            message: format!("sandbox result file was not valid JSON: {parse_error}"),
            details: ErrorDetails {
                error_type: "json_parsing_failed".into(),
                exit_code: None,
                stderr: None,
                stdout: None,
                package_name: package_name.to_string(),
                package_version: package_version.to_string(),
                ecosystem: ecosystem.to_string(),
                command: None,
            },
        }
    }

    pub fn unknown(package_name: &str, package_version: &str, ecosystem: &str, message: String) -> Self {
        SandboxError {
            category: ErrorCategory::UnknownError,
            message,
            details: ErrorDetails {
                error_type: "unknown".into(),
                exit_code: None,
                stderr: None,
                stdout: None,
                package_name: package_name.to_string(),
                package_version: package_version.to_string(),
                ecosystem: ecosystem.to_string(),
                command: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_well_known_exit_codes() {
        let e = SandboxError::from_exit(125, "", "", "django", "1.0", "pypi", "docker run ...");
        assert_eq!(e.category, ErrorCategory::DockerError);

        let e = SandboxError::from_exit(127, "", "", "django", "1.0", "pypi", "docker run ...");
        assert_eq!(e.category, ErrorCategory::CommandNotFound);
    }

    #[test]
    fn classifies_exit_one_by_stderr_content() {
        let e = SandboxError::from_exit(
            1,
            "Error: docker image not found",
            "",
            "django",
            "1.0",
            "pypi",
            "docker run ...",
        );
        assert_eq!(e.category, ErrorCategory::DockerImageError);

        let e = SandboxError::from_exit(1, "permission denied", "", "django", "1.0", "pypi", "cmd");
        assert_eq!(e.category, ErrorCategory::PermissionError);

        let e = SandboxError::from_exit(1, "something else failed", "", "django", "1.0", "pypi", "cmd");
        assert_eq!(e.category, ErrorCategory::AnalysisError);
    }

    #[test]
    fn unrecognized_exit_code_is_unknown() {
        let e = SandboxError::from_exit(42, "", "", "django", "1.0", "pypi", "cmd");
        assert_eq!(e.category, ErrorCategory::UnknownError);
    }
}
