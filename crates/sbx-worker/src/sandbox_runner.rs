//! Trait seam over the sandbox invocation and container lifecycle, so the
//! worker and timeout supervisor can be exercised with a scripted test
//! double instead of a real `docker` binary. Production wiring is a thin
//! pass-through to `sbx_sandbox`.

use async_trait::async_trait;

use sbx_core::error::SandboxError;
use sbx_core::purl::Ecosystem;
use sbx_sandbox::{invoke, ContainerManager, InvocationOutcome, InvocationSpec};

#[async_trait]
pub trait SandboxInvoker: Send + Sync {
    async fn invoke(
        &self,
        package_name: &str,
        package_version: &str,
        ecosystem: Ecosystem,
    ) -> Result<InvocationOutcome, SandboxError>;
}

pub struct DockerSandboxInvoker {
    pub spec: InvocationSpec,
}

#[async_trait]
impl SandboxInvoker for DockerSandboxInvoker {
    async fn invoke(
        &self,
        package_name: &str,
        package_version: &str,
        ecosystem: Ecosystem,
    ) -> Result<InvocationOutcome, SandboxError> {
        invoke(&self.spec, package_name, package_version, ecosystem).await
    }
}

#[async_trait]
pub trait ContainerSupervisor: Send + Sync {
    async fn stop(&self, container_id: &str, timeout_seconds: u32) -> bool;
    async fn logs(&self, container_id: &str, tail: u32) -> String;
    async fn is_running(&self, container_id: &str) -> bool;
    /// Best-effort lookup of a just-started container by image name, used to
    /// recover a `container_id` for a task shortly after it starts running.
    async fn find_running_by_image(&self, image: &str) -> Option<String>;
}

pub struct DockerContainerSupervisor;

#[async_trait]
impl ContainerSupervisor for DockerContainerSupervisor {
    async fn stop(&self, container_id: &str, timeout_seconds: u32) -> bool {
        ContainerManager::stop(container_id, timeout_seconds)
            .await
            .is_ok()
    }

    async fn logs(&self, container_id: &str, tail: u32) -> String {
        ContainerManager::logs(container_id, tail)
            .await
            .unwrap_or_else(|e| format!("failed to fetch container logs: {e}"))
    }

    async fn is_running(&self, container_id: &str) -> bool {
        ContainerManager::is_running(container_id).await
    }

    async fn find_running_by_image(&self, image: &str) -> Option<String> {
        ContainerManager::list_running()
            .await
            .ok()?
            .into_iter()
            .find(|c| c.image == image)
            .map(|c| c.id)
    }
}
