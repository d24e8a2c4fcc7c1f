//! Docker implementation of the `SandboxControl` port, backed by testcontainers.
//!
//! Started containers are owned by this sandbox until purged. Dropping a container
//! removes it, so instances never outlive the sandbox even when a purge is missed.

use crate::shared::infrastructure::sandbox::{
    HostBinding, RunOptions, SandboxControl, SandboxError, SandboxInstance,
};
use async_trait::async_trait;
use std::collections::HashMap;
use testcontainers::core::IntoContainerPort;
use testcontainers::{ContainerAsync, ContainerRequest, GenericImage, ImageExt, runners::AsyncRunner};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct DockerSandbox {
    containers: Mutex<HashMap<String, ContainerAsync<GenericImage>>>,
}

impl DockerSandbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SandboxControl for DockerSandbox {
    async fn ping(&self) -> Result<(), SandboxError> {
        // Same client and DOCKER_HOST resolution testcontainers starts containers with.
        let docker = bollard::Docker::connect_with_defaults()
            .map_err(|e| SandboxError::Unreachable(e.to_string()))?;
        let version = docker
            .version()
            .await
            .map_err(|e| SandboxError::Unreachable(e.to_string()))?;
        debug!(server = ?version.version, "docker reachable");
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<SandboxInstance, SandboxError> {
        // GenericImage methods first, ImageExt methods after.
        let image = GenericImage::new(options.repository.as_str(), options.tag.as_str())
            .with_exposed_port(options.exposed_port.tcp());
        let mut request: ContainerRequest<GenericImage> = image.with_cmd(options.cmd.clone());
        if let Some(host_port) = options.host_port {
            request = request.with_mapped_port(host_port, options.exposed_port.tcp());
        }

        let container = request.start().await.map_err(|e| SandboxError::StartFailed {
            image: options.image(),
            message: e.to_string(),
        })?;
        let instance = SandboxInstance {
            id: container.id().to_string(),
            image: options.image(),
        };
        debug!(instance = %instance.id, image = %instance.image, "container started");
        self.containers
            .lock()
            .await
            .insert(instance.id.clone(), container);
        Ok(instance)
    }

    async fn host_binding(
        &self,
        instance: &SandboxInstance,
        container_port: u16,
    ) -> Result<HostBinding, SandboxError> {
        let not_bound = || SandboxError::PortNotBound {
            instance: instance.id.clone(),
            container_port,
        };
        let containers = self.containers.lock().await;
        let container = containers.get(&instance.id).ok_or_else(not_bound)?;
        let host = container.get_host().await.map_err(|_| not_bound())?;
        let port = container
            .get_host_port_ipv4(container_port)
            .await
            .map_err(|_| not_bound())?;
        Ok(HostBinding {
            host: host.to_string(),
            port,
        })
    }

    async fn purge(&self, instance: &SandboxInstance) -> Result<(), SandboxError> {
        let Some(container) = self.containers.lock().await.remove(&instance.id) else {
            return Ok(());
        };
        container.rm().await.map_err(|e| SandboxError::PurgeFailed {
            instance: instance.id.clone(),
            message: e.to_string(),
        })?;
        debug!(instance = %instance.id, "container removed");
        Ok(())
    }
}
