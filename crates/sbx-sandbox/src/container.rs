use regex::Regex;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("docker command failed: {0}")]
    DockerCommand(String),
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed docker inspect output: {0}")]
    MalformedInspect(String),
}

#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: String,
    pub image: String,
    pub status: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub exit_code: i64,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
}

/// Shells out to the `docker` CLI to manage sandbox containers (spec
/// component C8). Deliberately a thin CLI wrapper rather than a daemon-API
/// client — the host running this service owns the docker socket directly.
pub struct ContainerManager;

impl ContainerManager {
    pub async fn list_running() -> Result<Vec<ContainerSummary>, ContainerError> {
        let output = Command::new("docker")
            .args(["ps", "--format", "{{.ID}}\t{{.Image}}\t{{.Status}}\t{{.Names}}"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ContainerError::DockerCommand(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut containers = Vec::new();
        for line in stdout.lines() {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() >= 4 {
                containers.push(ContainerSummary {
                    id: parts[0].to_string(),
                    image: parts[1].to_string(),
                    status: parts[2].to_string(),
                    name: parts[3].to_string(),
                });
            }
        }
        Ok(containers)
    }

    /// Try a graceful stop first, then force-kill if that fails.
    pub async fn stop(container_id: &str, timeout_seconds: u32) -> Result<(), ContainerError> {
        let graceful = Command::new("docker")
            .args(["stop", "--time", &timeout_seconds.to_string(), container_id])
            .output()
            .await?;

        if graceful.status.success() {
            return Ok(());
        }

        tracing::warn!(container_id, "graceful stop failed, force killing");
        let killed = Command::new("docker")
            .args(["kill", container_id])
            .output()
            .await?;

        if killed.status.success() {
            Ok(())
        } else {
            Err(ContainerError::DockerCommand(
                String::from_utf8_lossy(&killed.stderr).to_string(),
            ))
        }
    }

    pub async fn remove(container_id: &str, force: bool) -> Result<(), ContainerError> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(container_id);

        let output = Command::new("docker").args(&args).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ContainerError::DockerCommand(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    pub async fn inspect(container_id: &str) -> Result<ContainerInfo, ContainerError> {
        let output = Command::new("docker")
            .args(["inspect", container_id])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ContainerError::NotFound(container_id.to_string()));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ContainerError::MalformedInspect(e.to_string()))?;
        let entry = parsed
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| ContainerError::MalformedInspect("empty inspect array".into()))?;

        let state = &entry["State"];
        Ok(ContainerInfo {
            id: entry["Id"].as_str().unwrap_or_default().to_string(),
            name: entry["Name"]
                .as_str()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: entry["Config"]["Image"].as_str().unwrap_or_default().to_string(),
            status: state["Status"].as_str().unwrap_or_default().to_string(),
            started_at: state["StartedAt"].as_str().map(String::from),
            finished_at: state["FinishedAt"].as_str().map(String::from),
            exit_code: state["ExitCode"].as_i64().unwrap_or(0),
            running: state["Running"].as_bool().unwrap_or(false),
            paused: state["Paused"].as_bool().unwrap_or(false),
            restarting: state["Restarting"].as_bool().unwrap_or(false),
        })
    }

    pub async fn is_running(container_id: &str) -> bool {
        Self::inspect(container_id)
            .await
            .map(|info| info.running)
            .unwrap_or(false)
    }

    pub async fn cleanup_stopped() -> Result<u32, ContainerError> {
        let output = Command::new("docker")
            .args(["container", "prune", "-f"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ContainerError::DockerCommand(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let re = Regex::new(r"Deleted Containers:\s*(\d+)").expect("valid regex");
        Ok(re
            .captures(&stdout)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0))
    }

    pub async fn logs(container_id: &str, tail: u32) -> Result<String, ContainerError> {
        let output = Command::new("docker")
            .args(["logs", "--tail", &tail.to_string(), container_id])
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(ContainerError::DockerCommand(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    /// Best-effort container ID extraction from a command line or log
    /// fragment, trying the most specific pattern first.
    pub fn extract_id_from_command(command: &str) -> Option<String> {
        let patterns = [
            r"container_id=([a-f0-9]{64})",
            r"container_id=([a-f0-9]{12})",
            r"--name\s+([a-f0-9]{12})",
            r"([a-f0-9]{12})",
        ];
        for pattern in patterns {
            let re = Regex::new(pattern).expect("valid regex");
            if let Some(caps) = re.captures(command) {
                return caps.get(1).map(|m| m.as_str().to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_id_prefers_explicit_container_id_over_bare_hex() {
        let cmd = "docker run --name a1b2c3d4e5f6 other text container_id=1234567890ab";
        assert_eq!(
            ContainerManager::extract_id_from_command(cmd).as_deref(),
            Some("1234567890ab")
        );
    }

    #[test]
    fn extract_id_falls_back_to_bare_hex_string() {
        let cmd = "some log line mentioning abc123abc123 in passing";
        assert_eq!(
            ContainerManager::extract_id_from_command(cmd).as_deref(),
            Some("abc123abc123")
        );
    }

    #[test]
    fn extract_id_returns_none_when_nothing_matches() {
        assert_eq!(ContainerManager::extract_id_from_command("no ids here"), None);
    }
}
