// Ports for the sandbox that runs ephemeral store instances.
//
// Purpose
// - Describe the four capabilities the fixture needs from a container runtime: check that it
//   is reachable, run an image, resolve a bound host port, purge an instance.
//
// Boundaries
// - No container runtime here. Adapters implement the trait (Docker, in memory).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox runtime unreachable: {0}")]
    Unreachable(String),

    #[error("could not start {image}: {message}")]
    StartFailed { image: String, message: String },

    #[error("port {container_port} of instance {instance} is not bound")]
    PortNotBound { instance: String, container_port: u16 },

    #[error("could not purge instance {instance}: {message}")]
    PurgeFailed { instance: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub repository: String,
    pub tag: String,
    pub cmd: Vec<String>,
    pub exposed_port: u16,
    /// Pin the exposed port to this host port; an ephemeral port is chosen when unset.
    pub host_port: Option<u16>,
}

impl RunOptions {
    pub fn image(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Reference to a running sandbox instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxInstance {
    pub id: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host: String,
    pub port: u16,
}

#[async_trait]
pub trait SandboxControl: Send + Sync {
    async fn ping(&self) -> Result<(), SandboxError>;

    /// Starts an instance that is removed automatically once purged or abandoned.
    async fn run(&self, options: &RunOptions) -> Result<SandboxInstance, SandboxError>;

    async fn host_binding(
        &self,
        instance: &SandboxInstance,
        container_port: u16,
    ) -> Result<HostBinding, SandboxError>;

    /// Purging an unknown or already purged instance is not an error.
    async fn purge(&self, instance: &SandboxInstance) -> Result<(), SandboxError>;
}

pub mod docker;
pub mod in_memory;
