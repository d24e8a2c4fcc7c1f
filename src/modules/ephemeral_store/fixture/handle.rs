// Handle to one running ephemeral store instance.
//
// Responsibilities
// - Expose the endpoint the store is reachable at; it never changes for the handle's lifetime.
// - Purge the instance at most once, however many times and from wherever teardown is requested.
// - A failed purge leaves the handle live, so a later teardown, close or drop tries again.
// - Fall back to a background purge, with a warning, when a handle is dropped before teardown.

use crate::shared::infrastructure::sandbox::{SandboxControl, SandboxError, SandboxInstance};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub(crate) struct Teardown {
    control: Arc<dyn SandboxControl>,
    instance: SandboxInstance,
    done: AtomicBool,
    purging: Mutex<()>,
}

impl Teardown {
    pub(crate) fn new(control: Arc<dyn SandboxControl>, instance: SandboxInstance) -> Self {
        Self {
            control,
            instance,
            done: AtomicBool::new(false),
            purging: Mutex::new(()),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Returns `true` when this call performed the purge.
    pub(crate) async fn run(&self) -> Result<bool, SandboxError> {
        let _purging = self.purging.lock().await;
        if self.done.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.control.purge(&self.instance).await?;
        self.done.store(true, Ordering::SeqCst);
        info!(instance = %self.instance.id, image = %self.instance.image, "fixture torn down");
        Ok(true)
    }
}

pub struct FixtureHandle {
    endpoint: String,
    teardown: Arc<Teardown>,
}

impl FixtureHandle {
    pub(crate) fn new(endpoint: String, teardown: Arc<Teardown>) -> Self {
        Self { endpoint, teardown }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn instance(&self) -> &SandboxInstance {
        &self.teardown.instance
    }

    pub fn is_torn_down(&self) -> bool {
        self.teardown.is_done()
    }

    /// Purges the instance. Later calls are no-ops.
    pub async fn teardown(&self) -> Result<(), SandboxError> {
        self.teardown.run().await.map(|_| ())
    }
}

impl std::fmt::Debug for FixtureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureHandle")
            .field("endpoint", &self.endpoint)
            .field("instance", &self.teardown.instance.id)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl Drop for FixtureHandle {
    fn drop(&mut self) {
        if self.teardown.is_done() {
            return;
        }
        warn!(instance = %self.teardown.instance.id, "fixture dropped without teardown");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let teardown = self.teardown.clone();
            runtime.spawn(async move {
                if let Err(e) = teardown.run().await {
                    warn!(error = %e, "background teardown failed");
                }
            });
        }
    }
}
