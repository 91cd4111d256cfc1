use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.package-sandbox/config.toml`,
/// overridden field-by-field by environment variables, then defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            worker: WorkerConfig::default(),
            sandbox: SandboxConfig::default(),
            reports: ReportsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `~/.package-sandbox/config.toml`, falling back to
    /// defaults when the file does not exist. Environment variables
    /// prefixed `PKGSBX_` override individual fields after the file load.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_from_path_or_default(&Self::default_path())?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from_path_or_default(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Ok(Config::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PKGSBX_LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Ok(v) = std::env::var("PKGSBX_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PKGSBX_PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("PKGSBX_DATABASE_PATH") {
            self.store.database_path = v;
        }
        if let Ok(v) = std::env::var("PKGSBX_MEDIA_ROOT") {
            self.reports.media_root = v;
        }
        if let Ok(v) = std::env::var("PKGSBX_MEDIA_BASE_URL") {
            self.reports.media_base_url = v;
        }
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".package-sandbox")
            .join("config.toml")
    }
}

/// Expand a leading `~` into the user's home directory. Config fields like
/// `store.database_path` and `reports.media_root` are written with `~` for
/// readability and need this before they're handed to `sbx-store`/`std::fs`.
pub fn expand_path(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.package-sandbox/tasks.db".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: u32,
    #[serde(default = "default_timeout_minutes")]
    pub default_timeout_minutes: i64,
    #[serde(default = "default_idle_poll_seconds")]
    pub worker_idle_poll_seconds: u64,
    #[serde(default = "default_error_backoff_seconds")]
    pub worker_error_backoff_seconds: u64,
    #[serde(default = "default_graceful_stop_seconds")]
    pub graceful_container_stop_seconds: u64,
    #[serde(default = "default_dedupe_window_hours")]
    pub dedupe_active_window_hours: i64,
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_hour: default_rate_limit_per_hour(),
            default_timeout_minutes: default_timeout_minutes(),
            worker_idle_poll_seconds: default_idle_poll_seconds(),
            worker_error_backoff_seconds: default_error_backoff_seconds(),
            graceful_container_stop_seconds: default_graceful_stop_seconds(),
            dedupe_active_window_hours: default_dedupe_window_hours(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
        }
    }
}

fn default_rate_limit_per_hour() -> u32 {
    100
}
fn default_timeout_minutes() -> i64 {
    30
}
fn default_idle_poll_seconds() -> u64 {
    5
}
fn default_error_backoff_seconds() -> u64 {
    10
}
fn default_graceful_stop_seconds() -> u64 {
    10
}
fn default_dedupe_window_hours() -> i64 {
    24
}
fn default_heartbeat_interval_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_command")]
    pub command: String,
    #[serde(default = "default_image_name")]
    pub image_name: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command: default_sandbox_command(),
            image_name: default_image_name(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_sandbox_command() -> String {
    "analyze-package".into()
}
fn default_image_name() -> String {
    "dynamic-analysis:latest".into()
}
fn default_results_dir() -> String {
    "/tmp/results".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_media_root")]
    pub media_root: String,
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            media_base_url: default_media_base_url(),
        }
    }
}

fn default_media_root() -> String {
    "~/.package-sandbox/media".into()
}
fn default_media_base_url() -> String {
    "http://127.0.0.1:8080/media".into()
}
