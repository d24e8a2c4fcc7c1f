// Explicitly opened and closed owner of the sandbox connection.
//
// Purpose
// - Start ephemeral store instances and hand each one out as its own FixtureHandle.
//
// Responsibilities
// - Refuse to open when the sandbox runtime is unreachable.
// - Resolve the endpoint of every started instance, purging it again if that fails.
// - On close, tear down every handle that is still live.

use crate::modules::ephemeral_store::core::image_spec::ImageSpec;
use crate::modules::ephemeral_store::fixture::handle::{FixtureHandle, Teardown};
use crate::shared::infrastructure::sandbox::{SandboxControl, SandboxError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("fixture start cancelled")]
    Cancelled,

    #[error("orchestrator is closed")]
    Closed,
}

pub struct SandboxOrchestrator {
    control: Arc<dyn SandboxControl>,
    started: Mutex<Vec<Arc<Teardown>>>,
    closed: AtomicBool,
}

impl SandboxOrchestrator {
    pub async fn open(control: Arc<dyn SandboxControl>) -> Result<Self, FixtureError> {
        control.ping().await?;
        Ok(Self {
            control,
            started: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub async fn start(
        &self,
        image: &ImageSpec,
        exposed_port: u16,
        cancel: &CancellationToken,
    ) -> Result<FixtureHandle, FixtureError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FixtureError::Closed);
        }
        let options = image.run_options(exposed_port);
        let instance = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FixtureError::Cancelled),
            instance = self.control.run(&options) => instance?,
        };
        let teardown = Arc::new(Teardown::new(self.control.clone(), instance.clone()));
        {
            let mut started = self.started.lock().await;
            started.retain(|t| !t.is_done());
            started.push(teardown.clone());
        }

        let binding = match self.control.host_binding(&instance, exposed_port).await {
            Ok(binding) => binding,
            Err(e) => {
                if let Err(purge) = teardown.run().await {
                    warn!(instance = %instance.id, error = %purge, "purge after failed start");
                }
                return Err(e.into());
            }
        };
        let handle = FixtureHandle::new(format!("http://{}:{}", binding.host, binding.port), teardown);
        if cancel.is_cancelled() {
            handle.teardown().await?;
            return Err(FixtureError::Cancelled);
        }
        info!(instance = %instance.id, image = %instance.image, endpoint = %handle.endpoint(), "fixture started");
        Ok(handle)
    }

    /// Number of started instances not yet torn down.
    pub async fn live_count(&self) -> usize {
        self.started.lock().await.iter().filter(|t| !t.is_done()).count()
    }

    /// Tears down every handle still live and refuses further starts. Returns how many
    /// instances this call purged; the first purge failure is returned after all were tried,
    /// and the failed instances stay registered for the next close.
    pub async fn close(&self) -> Result<usize, FixtureError> {
        self.closed.store(true, Ordering::SeqCst);
        let started = std::mem::take(&mut *self.started.lock().await);
        let mut purged = 0;
        let mut first_error = None;
        let mut remaining = Vec::new();
        for teardown in started {
            match teardown.run().await {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "teardown on close failed");
                    first_error.get_or_insert(e);
                    remaining.push(teardown);
                }
            }
        }
        self.started.lock().await.extend(remaining);
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(purged),
        }
    }
}
