//! The process entry point's long-lived owned value: wires the store, the
//! admission controller, the exclusive worker, and the HTTP API together and
//! runs them to completion. Grounded on `at-daemon::daemon::Daemon`, but
//! carrying a single background loop (the worker) instead of a
//! patrol/heartbeat/kpi trio, since this service has exactly one background
//! concern: draining the queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use sbx_api::ApiState;
use sbx_core::config::Config;
use sbx_sandbox::invocation::InvocationSpec;
use sbx_store::Store;
use sbx_worker::{
    AdmissionController, ContainerSupervisor, DockerContainerSupervisor, DockerSandboxInvoker,
    SandboxInvoker, ShutdownSignal, TimeoutSupervisor, Worker, WorkerSettings,
};

pub struct Daemon {
    config: Config,
    store: Arc<Store>,
    admission: Arc<AdmissionController>,
    timeout_supervisor: Arc<TimeoutSupervisor>,
    worker: Arc<Worker>,
    shutdown: ShutdownSignal,
}

impl Daemon {
    pub async fn new(config: Config) -> Result<Self> {
        let database_path = sbx_core::config::expand_path(&config.store.database_path);
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let media_root = sbx_core::config::expand_path(&config.reports.media_root);
        std::fs::create_dir_all(&media_root)
            .with_context(|| format!("failed to create media root {}", media_root.display()))?;

        let store = Arc::new(
            Store::open(database_path, media_root)
                .await
                .context("failed to open task/report store")?,
        );

        let admission = Arc::new(AdmissionController::new(
            store.clone(),
            config.worker.dedupe_active_window_hours,
            config.worker.default_timeout_minutes,
            config.reports.media_base_url.clone(),
        ));

        let containers: Arc<dyn ContainerSupervisor> = Arc::new(DockerContainerSupervisor);
        let timeout_supervisor = Arc::new(TimeoutSupervisor::new(
            store.clone(),
            containers.clone(),
            Duration::from_secs(config.worker.graceful_container_stop_seconds),
        ));

        let shutdown = ShutdownSignal::new();

        let sandbox: Arc<dyn SandboxInvoker> = Arc::new(DockerSandboxInvoker {
            spec: InvocationSpec {
                script_path: config.sandbox.command.clone(),
                image_name: config.sandbox.image_name.clone(),
                results_dir: sbx_core::config::expand_path(&config.sandbox.results_dir),
            },
        });

        let worker_settings = WorkerSettings {
            idle_poll: Duration::from_secs(config.worker.worker_idle_poll_seconds),
            error_backoff: Duration::from_secs(config.worker.worker_error_backoff_seconds),
            heartbeat_interval: Duration::from_secs(config.worker.heartbeat_interval_seconds),
            graceful_container_stop: Duration::from_secs(config.worker.graceful_container_stop_seconds),
            media_base_url: config.reports.media_base_url.clone(),
            sandbox_image_name: config.sandbox.image_name.clone(),
        };

        let worker = Arc::new(Worker::new(
            store.clone(),
            sandbox,
            containers,
            timeout_supervisor.clone(),
            worker_settings,
            shutdown.clone(),
        ));

        Ok(Self {
            config,
            store,
            admission,
            timeout_supervisor,
            worker,
            shutdown,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying store, exposed for credential provisioning (by
    /// `sbx-cli`, or directly by tests) without routing through HTTP.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Run the exclusive worker loop and the HTTP API to completion. The
    /// worker runs as a background task; the API server runs on the calling
    /// task and this function returns once it stops (on shutdown).
    pub async fn run_with_listener(&self, listener: tokio::net::TcpListener) -> Result<()> {
        self.worker.clone().spawn();
        info!("worker loop started");

        let api_state = Arc::new(ApiState::new(
            self.store.clone(),
            self.admission.clone(),
            self.timeout_supervisor.clone(),
        ));
        let router = sbx_api::build_router(api_state);

        let bind_addr = listener.local_addr()?;
        info!(%bind_addr, "API server listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown.subscribe();
                let _ = rx.recv().await;
            })
            .await
            .context("API server error")?;

        info!("daemon stopped");
        Ok(())
    }
}
