// In memory implementation of the SandboxControl port.
//
// Purpose
// - Exercise fixture lifecycle and bootstrap without a container runtime.
//
// Responsibilities
// - Hand out instances with unique ids and distinct host ports.
// - Count purges per instance so tests can assert teardown happened exactly once.

use crate::shared::infrastructure::sandbox::{
    HostBinding, RunOptions, SandboxControl, SandboxError, SandboxInstance,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

const FIRST_EPHEMERAL_PORT: u16 = 49153;

pub struct InMemorySandbox {
    running: Mutex<HashMap<String, HostBinding>>,
    purges: Mutex<HashMap<String, usize>>,
    next_port: AtomicU16,
    is_offline: AtomicBool,
    fail_runs: AtomicBool,
    failing_purges: AtomicUsize,
    start_delay: Duration,
}

impl Default for InMemorySandbox {
    fn default() -> Self {
        Self {
            running: Mutex::default(),
            purges: Mutex::default(),
            next_port: AtomicU16::new(FIRST_EPHEMERAL_PORT),
            is_offline: AtomicBool::new(false),
            fail_runs: AtomicBool::new(false),
            failing_purges: AtomicUsize::new(0),
            start_delay: Duration::ZERO,
        }
    }
}

impl InMemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `run` takes `delay` before the instance exists, like a cold image pull.
    pub fn starting_slowly(delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..Self::default()
        }
    }

    /// The next `count` purges fail and leave the instance running.
    pub fn fail_next_purges(&self, count: usize) {
        self.failing_purges.store(count, Ordering::SeqCst);
    }

    pub fn toggle_offline(&self) {
        self.is_offline.fetch_xor(true, Ordering::SeqCst);
    }

    pub fn toggle_failing_runs(&self) {
        self.fail_runs.fetch_xor(true, Ordering::SeqCst);
    }

    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    pub async fn purge_count(&self, instance: &SandboxInstance) -> usize {
        self.purges.lock().await.get(&instance.id).copied().unwrap_or(0)
    }

    pub async fn total_purges(&self) -> usize {
        self.purges.lock().await.values().sum()
    }
}

#[async_trait::async_trait]
impl SandboxControl for InMemorySandbox {
    async fn ping(&self) -> Result<(), SandboxError> {
        if self.is_offline.load(Ordering::SeqCst) {
            return Err(SandboxError::Unreachable("sandbox offline".to_string()));
        }
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<SandboxInstance, SandboxError> {
        self.ping().await?;
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_runs.load(Ordering::SeqCst) {
            return Err(SandboxError::StartFailed {
                image: options.image(),
                message: "image pull failed".to_string(),
            });
        }
        let port = match options.host_port {
            Some(port) => port,
            None => self.next_port.fetch_add(1, Ordering::SeqCst),
        };
        let instance = SandboxInstance {
            id: Uuid::now_v7().to_string(),
            image: options.image(),
        };
        self.running.lock().await.insert(
            instance.id.clone(),
            HostBinding {
                host: "localhost".to_string(),
                port,
            },
        );
        Ok(instance)
    }

    async fn host_binding(
        &self,
        instance: &SandboxInstance,
        container_port: u16,
    ) -> Result<HostBinding, SandboxError> {
        self.running
            .lock()
            .await
            .get(&instance.id)
            .cloned()
            .ok_or_else(|| SandboxError::PortNotBound {
                instance: instance.id.clone(),
                container_port,
            })
    }

    async fn purge(&self, instance: &SandboxInstance) -> Result<(), SandboxError> {
        let failing = self
            .failing_purges
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SandboxError::PurgeFailed {
                instance: instance.id.clone(),
                message: "container is busy".to_string(),
            });
        }
        *self.purges.lock().await.entry(instance.id.clone()).or_default() += 1;
        self.running.lock().await.remove(&instance.id);
        Ok(())
    }
}
