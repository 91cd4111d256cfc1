//! The exclusive single-worker drain loop (spec component C7), grounded on
//! `queue_manager.py`'s `_worker_loop`/`_get_next_task`/`_process_task`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sbx_core::types::{canonical_download_url, ErrorCategory, Report, Task};
use sbx_store::{Store, StoreError};
use uuid::Uuid;

use crate::report_envelope::build_report_payload;
use crate::sandbox_runner::{ContainerSupervisor, SandboxInvoker};
use crate::shutdown::ShutdownSignal;
use crate::timeout_supervisor::TimeoutSupervisor;

pub struct WorkerSettings {
    pub idle_poll: Duration,
    pub error_backoff: Duration,
    pub heartbeat_interval: Duration,
    pub graceful_container_stop: Duration,
    pub media_base_url: String,
    pub sandbox_image_name: String,
}

pub struct Worker {
    store: Arc<Store>,
    sandbox: Arc<dyn SandboxInvoker>,
    containers: Arc<dyn ContainerSupervisor>,
    timeout_supervisor: Arc<TimeoutSupervisor>,
    settings: WorkerSettings,
    shutdown: ShutdownSignal,
    started: AtomicBool,
}

impl Worker {
    pub fn new(
        store: Arc<Store>,
        sandbox: Arc<dyn SandboxInvoker>,
        containers: Arc<dyn ContainerSupervisor>,
        timeout_supervisor: Arc<TimeoutSupervisor>,
        settings: WorkerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            sandbox,
            containers,
            timeout_supervisor,
            settings,
            shutdown,
            started: AtomicBool::new(false),
        }
    }

    /// Start the drain loop as a background task. Idempotent: a second call
    /// before the first has stopped is a no-op.
    pub fn spawn(self: Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(async move { self.run_loop().await });
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            if self.shutdown.is_shutting_down() {
                tracing::info!("worker stopping, shutdown already signalled");
                break;
            }
            match self.run_iteration().await {
                Ok(true) => {}
                Ok(false) => {
                    let mut shutdown_rx = self.shutdown.subscribe();
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.idle_poll) => {}
                        _ = shutdown_rx.recv() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "worker iteration failed");
                    tokio::time::sleep(self.settings.error_backoff).await;
                }
            }
        }
        tracing::info!("worker loop stopped");
    }

    /// Runs the timeout sweep, then dequeues and processes at most one task.
    /// Returns `Ok(true)` if a task was processed (caller should poll again
    /// immediately), `Ok(false)` if the queue is empty or a task is already
    /// running (caller should idle-poll).
    async fn run_iteration(&self) -> Result<bool, StoreError> {
        self.timeout_supervisor.check_once().await?;

        if self.store.tasks.any_running().await? {
            return Ok(false);
        }

        loop {
            let Some(head) = self.store.tasks.dequeue_head().await? else {
                return Ok(false);
            };

            // Late cache hit: a different task for the same PURL completed
            // after `head` was enqueued. Fold it in and keep dequeuing
            // without ever invoking the sandbox for `head`.
            if let Some(completed) = self.store.tasks.find_latest_completed_by_purl(&head.purl).await? {
                if let Some(report_id) = completed.report_id {
                    let download_url = completed.download_url.clone().unwrap_or_else(|| {
                        canonical_download_url(
                            &self.settings.media_base_url,
                            head.ecosystem,
                            &head.package_name,
                            &head.package_version,
                        )
                    });
                    self.store.tasks.complete_via_cache_hit(head.id, report_id, &download_url).await?;
                    self.store.tasks.renumber_queue().await?;
                    tracing::info!(task_id = %head.id, purl = %head.purl, "late cache hit folded into existing report");
                    continue;
                }
            }

            self.process_task(head).await?;
            return Ok(true);
        }
    }

    async fn process_task(&self, task: Task) -> Result<(), StoreError> {
        self.store.tasks.mark_running(task.id).await?;
        tracing::info!(task_id = %task.id, purl = %task.purl, "task running");

        let store = self.store.clone();
        let task_id = task.id;
        let image = self.settings.sandbox_image_name.clone();
        let containers = self.containers.clone();
        tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(500)).await;
                if let Some(id) = containers.find_running_by_image(&image).await {
                    if let Err(e) = store.tasks.set_container_id(task_id, &id).await {
                        tracing::warn!(task_id = %task_id, error = %e, "failed to record container id");
                    }
                    return;
                }
            }
            tracing::debug!(task_id = %task_id, "could not locate sandbox container within grace period");
        });

        let invoke_fut = self
            .sandbox
            .invoke(&task.package_name, &task.package_version, task.ecosystem);
        tokio::pin!(invoke_fut);

        let mut ticker = tokio::time::interval(self.settings.heartbeat_interval);
        ticker.tick().await;

        let mut shutdown_rx = self.shutdown.subscribe();
        let outcome = loop {
            tokio::select! {
                result = &mut invoke_fut => break Some(result),
                _ = ticker.tick() => {
                    if let Err(e) = self.store.tasks.refresh_heartbeat(task.id).await {
                        tracing::warn!(task_id = %task.id, error = %e, "heartbeat refresh failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::warn!(task_id = %task.id, "shutdown requested mid-run, stopping container");
                    if let Ok(Some(current)) = self.store.tasks.get_task(task.id).await {
                        if let Some(container_id) = current.container_id {
                            self.containers.stop(&container_id, self.settings.graceful_container_stop.as_secs() as u32).await;
                        }
                    }
                    break None;
                }
            }
        };

        match outcome {
            Some(Ok(result)) => {
                let report = Report {
                    id: Uuid::new_v4(),
                    ecosystem: task.ecosystem,
                    package_name: task.package_name.clone(),
                    package_version: task.package_version.clone(),
                    duration_seconds: result.duration_seconds,
                    payload: build_report_payload(&task, &result),
                    created_at: chrono::Utc::now(),
                };
                let download_url = canonical_download_url(
                    &self.settings.media_base_url,
                    task.ecosystem,
                    &task.package_name,
                    &task.package_version,
                );
                self.store.reports.insert(report.clone()).await?;
                self.store.tasks.complete_task(task.id, report.id, &download_url).await?;
                self.store.tasks.renumber_queue().await?;
                tracing::info!(task_id = %task.id, purl = %task.purl, duration = result.duration_seconds, "task completed");
            }
            Some(Err(sandbox_err)) => {
                tracing::warn!(task_id = %task.id, purl = %task.purl, category = ?sandbox_err.category, "task failed");
                let details = serde_json::to_value(&sandbox_err.details).unwrap_or(serde_json::Value::Null);
                self.store
                    .tasks
                    .fail_task(task.id, sandbox_err.category, &sandbox_err.message, details)
                    .await?;
                self.store.tasks.renumber_queue().await?;
            }
            None => {
                let details = serde_json::json!({"reason": "worker shut down mid-execution"});
                self.store
                    .tasks
                    .fail_task(task.id, ErrorCategory::UnknownError, "worker shut down during execution", details)
                    .await?;
                self.store.tasks.renumber_queue().await?;
            }
        }
        Ok(())
    }
}
