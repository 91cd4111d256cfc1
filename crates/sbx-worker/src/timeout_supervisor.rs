//! Timeout supervisor (spec component C9): finds running tasks past their
//! deadline, stops their containers, and fails them, grounded on
//! `queue_manager.py`'s `check_timeouts`/`_handle_timed_out_task`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use sbx_core::types::{ErrorCategory, Task};
use sbx_store::{Store, StoreError};

use crate::sandbox_runner::ContainerSupervisor;

pub struct TimeoutSupervisor {
    store: Arc<Store>,
    containers: Arc<dyn ContainerSupervisor>,
    graceful_stop: Duration,
}

impl TimeoutSupervisor {
    pub fn new(store: Arc<Store>, containers: Arc<dyn ContainerSupervisor>, graceful_stop: Duration) -> Self {
        Self {
            store,
            containers,
            graceful_stop,
        }
    }

    /// One pass: fail every running task whose deadline has passed, then
    /// renumber the queue once if anything changed. Returns the count of
    /// tasks it failed.
    pub async fn check_once(&self) -> Result<usize, StoreError> {
        let running = self.store.tasks.list_running().await?;
        let now = Utc::now();
        let mut handled = 0;
        for task in running {
            if !task.is_timed_out(now) {
                continue;
            }
            self.handle_timed_out(&task, now).await?;
            handled += 1;
        }
        if handled > 0 {
            self.store.tasks.renumber_queue().await?;
        }
        Ok(handled)
    }

    async fn handle_timed_out(&self, task: &Task, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut container_stopped = None;
        if let Some(container_id) = &task.container_id {
            let stopped = self
                .containers
                .stop(container_id, self.graceful_stop.as_secs() as u32)
                .await;
            container_stopped = Some(stopped);
            let logs = self.containers.logs(container_id, 50).await;
            tracing::warn!(task_id = %task.id, container_id, logs, "captured logs from timed-out container");
        }

        let details = serde_json::json!({
            "timeout_minutes": task.timeout_minutes,
            "started_at": task.started_at.map(|d| d.to_rfc3339()),
            "timed_out_at": now.to_rfc3339(),
            "container_id": task.container_id,
            "container_stopped": container_stopped,
        });

        self.store
            .tasks
            .fail_task(
                task.id,
                ErrorCategory::TimeoutError,
                &format!("Task timed out after {} minutes", task.timeout_minutes),
                details,
            )
            .await
    }

    /// Snapshot for the `timeout_status` endpoint (C10), grounded on
    /// `get_timeout_status`.
    pub async fn status(&self) -> Result<TimeoutStatus, StoreError> {
        let running = self.store.tasks.list_running().await?;
        let now = Utc::now();
        let mut tasks = Vec::with_capacity(running.len());
        let mut timed_out_count = 0;
        for task in &running {
            let is_timed_out = task.is_timed_out(now);
            if is_timed_out {
                timed_out_count += 1;
            }
            let container_running = match &task.container_id {
                Some(id) => self.containers.is_running(id).await,
                None => false,
            };
            tasks.push(RunningTaskStatus {
                task_id: task.id,
                purl: task.purl.clone(),
                started_at: task.started_at,
                timeout_minutes: task.timeout_minutes,
                remaining_minutes: task.remaining_time_minutes(now),
                is_timed_out,
                container_id: task.container_id.clone(),
                container_running,
            });
        }
        Ok(TimeoutStatus {
            running_tasks: running.len(),
            timed_out_tasks: timed_out_count,
            tasks,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutStatus {
    pub running_tasks: usize,
    pub timed_out_tasks: usize,
    pub tasks: Vec<RunningTaskStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningTaskStatus {
    pub task_id: Uuid,
    pub purl: String,
    pub started_at: Option<DateTime<Utc>>,
    pub timeout_minutes: i64,
    pub remaining_minutes: Option<i64>,
    pub is_timed_out: bool,
    pub container_id: Option<String>,
    pub container_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sbx_core::purl::Ecosystem;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeContainers {
        stopped: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerSupervisor for FakeContainers {
        async fn stop(&self, container_id: &str, _timeout_seconds: u32) -> bool {
            self.stopped.lock().unwrap().push(container_id.to_string());
            true
        }
        async fn logs(&self, _container_id: &str, _tail: u32) -> String {
            "fake logs".into()
        }
        async fn is_running(&self, _container_id: &str) -> bool {
            false
        }
        async fn find_running_by_image(&self, _image: &str) -> Option<String> {
            None
        }
    }

    async fn store() -> Arc<Store> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(Store::open_in_memory(dir.path()).await.unwrap())
    }

    #[tokio::test]
    async fn timed_out_task_is_failed_and_container_stopped() {
        let store = store().await;
        let containers = Arc::new(FakeContainers::default());
        let supervisor = TimeoutSupervisor::new(store.clone(), containers.clone(), Duration::from_secs(10));

        let mut task = Task::new(
            Uuid::new_v4(),
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            1,
            None,
        );
        task.status = sbx_core::types::TaskStatus::Running;
        task.started_at = Some(Utc::now() - chrono::Duration::minutes(5));
        task.container_id = Some("abc123abc123".into());
        store.tasks.insert_task(task.clone()).await.unwrap();

        let handled = supervisor.check_once().await.unwrap();
        assert_eq!(handled, 1);

        let fetched = store.tasks.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, sbx_core::types::TaskStatus::Failed);
        assert_eq!(fetched.error_category, Some(ErrorCategory::TimeoutError));
        assert_eq!(containers.stopped.lock().unwrap().as_slice(), ["abc123abc123"]);
    }

    #[tokio::test]
    async fn non_timed_out_task_is_left_alone() {
        let store = store().await;
        let containers = Arc::new(FakeContainers::default());
        let supervisor = TimeoutSupervisor::new(store.clone(), containers, Duration::from_secs(10));

        let mut task = Task::new(
            Uuid::new_v4(),
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            30,
            None,
        );
        task.status = sbx_core::types::TaskStatus::Running;
        task.started_at = Some(Utc::now());
        store.tasks.insert_task(task.clone()).await.unwrap();

        let handled = supervisor.check_once().await.unwrap();
        assert_eq!(handled, 0);
    }
}
