// Scoped acquisition of a fixture.
//
// Purpose
// - Run a scenario against a freshly started fixture and release the fixture on every exit path:
//   normal return, error return, panic, and cancellation.
//
// Responsibilities
// - Run the scenario on its own task so a panic surfaces as a join error instead of skipping
//   teardown; the panic is resumed once the fixture is gone.
// - Abort the scenario when the token is cancelled.

use crate::modules::ephemeral_store::core::image_spec::ImageSpec;
use crate::modules::ephemeral_store::fixture::handle::FixtureHandle;
use crate::modules::ephemeral_store::fixture::orchestrator::{FixtureError, SandboxOrchestrator};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ScopedError<E> {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Scenario(E),
}

pub async fn with_fixture<F, Fut, T, E>(
    orchestrator: &SandboxOrchestrator,
    image: &ImageSpec,
    exposed_port: u16,
    cancel: &CancellationToken,
    scenario: F,
) -> Result<T, ScopedError<E>>
where
    F: FnOnce(Arc<FixtureHandle>) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = Arc::new(orchestrator.start(image, exposed_port, cancel).await?);
    let mut task = tokio::spawn(scenario(handle.clone()));

    let joined = tokio::select! {
        joined = &mut task => Some(joined),
        _ = cancel.cancelled() => {
            task.abort();
            // Wait for the abort so the scenario no longer touches the fixture.
            let _ = task.await;
            None
        }
    };

    let teardown = handle.teardown().await;
    match joined {
        None => {
            if let Err(e) = teardown {
                warn!(error = %e, "teardown after cancellation failed");
            }
            Err(FixtureError::Cancelled.into())
        }
        Some(Err(join_error)) if join_error.is_panic() => {
            if let Err(e) = teardown {
                warn!(error = %e, "teardown after panic failed");
            }
            std::panic::resume_unwind(join_error.into_panic())
        }
        Some(Err(_)) => {
            teardown.map_err(FixtureError::from)?;
            Err(FixtureError::Cancelled.into())
        }
        Some(Ok(Err(scenario_error))) => {
            if let Err(e) = teardown {
                warn!(error = %e, "teardown after failed scenario failed");
            }
            Err(ScopedError::Scenario(scenario_error))
        }
        Some(Ok(Ok(value))) => {
            teardown.map_err(FixtureError::from)?;
            Ok(value)
        }
    }
}
