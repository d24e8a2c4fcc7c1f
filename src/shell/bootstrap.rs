// Composition of the whole check.
//
// Responsibilities
// - Load the schema before anything is started, so a bad schema never boots a container.
// - Start the fixture, connect a store client to its endpoint, and provision the table behind the
//   readiness gate. The bootstrap deadline runs from the moment the fixture is up.
// - Run the insert-if-absent contract check, then release the fixture and close the sandbox.

use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::modules::conditional_writes::use_cases::load_schema::handler::{self as schema, SchemaError};
use crate::modules::conditional_writes::use_cases::provision_table::handler::TableProvisioner;
use crate::modules::conditional_writes::use_cases::put_if_absent::handler::ConditionalWriter;
use crate::modules::conditional_writes::use_cases::verify_contract::handler::{
    ContractError, ContractReport, verify_put_if_absent,
};
use crate::modules::ephemeral_store::core::image_spec::DYNAMODB_LOCAL_PORT;
use crate::modules::ephemeral_store::fixture::orchestrator::{FixtureError, SandboxOrchestrator};
use crate::modules::ephemeral_store::fixture::scope::{ScopedError, with_fixture};
use crate::modules::ephemeral_store::readiness::gate::{RetryError, retry, retry_when};
use crate::shared::infrastructure::key_value_store::dynamodb::{
    DynamoDbClientConfig, DynamoDbKeyValueStore,
};
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use crate::shared::infrastructure::sandbox::SandboxControl;
use crate::shell::config::{AppConfig, ReadinessConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Failures of the environment rather than of the contract under test.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("table definition needs both a HASH and a RANGE key")]
    MissingSortKey,

    #[error("store did not become ready: {0}")]
    NotReady(#[from] RetryError<StoreError>),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl From<ScopedError<RunError>> for RunError {
    fn from(err: ScopedError<RunError>) -> Self {
        match err {
            ScopedError::Fixture(e) => RunError::Fixture(e),
            ScopedError::Scenario(e) => e,
        }
    }
}

/// Builds a store client for the endpoint of a running fixture.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Store: KeyValueStore + 'static;

    async fn connect(&self, endpoint: &str) -> Arc<Self::Store>;
}

pub struct DynamoDbConnector {
    config: DynamoDbClientConfig,
}

impl DynamoDbConnector {
    pub fn new(config: DynamoDbClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for DynamoDbConnector {
    type Store = DynamoDbKeyValueStore;

    async fn connect(&self, endpoint: &str) -> Arc<Self::Store> {
        Arc::new(DynamoDbKeyValueStore::connect(&self.config.with_endpoint(endpoint)).await)
    }
}

/// Child of `parent` that is also cancelled once `timeout` elapses.
pub fn deadline_token(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs(), "bootstrap deadline reached");
                timer.cancel();
            }
        }
    });
    token
}

/// Retries table creation until the store accepts it.
pub async fn provision_when_ready<TStore>(
    store: Arc<TStore>,
    definition: &TableDefinition,
    table_name: &str,
    readiness: &ReadinessConfig,
    cancel: &CancellationToken,
) -> Result<(), BootstrapError>
where
    TStore: KeyValueStore + ?Sized,
{
    let provisioner = TableProvisioner::new(store);
    let provision = || provisioner.provision(definition, table_name);
    if readiness.transient_only {
        retry_when(&readiness.policy, cancel, provision, StoreError::is_transient).await?;
    } else {
        retry(&readiness.policy, cancel, provision).await?;
    }
    Ok(())
}

pub async fn run<TConnector>(
    config: &AppConfig,
    sandbox: Arc<dyn SandboxControl>,
    connector: Arc<TConnector>,
    cancel: &CancellationToken,
) -> Result<ContractReport, RunError>
where
    TConnector: StoreConnector,
{
    let definition = schema::load(&config.schema_path).await.map_err(BootstrapError::from)?;
    if definition.key_names().is_none() {
        return Err(BootstrapError::MissingSortKey.into());
    }

    let orchestrator = SandboxOrchestrator::open(sandbox).await?;

    let table_name = config.table_name.clone();
    let readiness = config.readiness.clone();
    let bootstrap_timeout = config.bootstrap_timeout;
    let parent = cancel.clone();
    let result = with_fixture(
        &orchestrator,
        &config.image,
        DYNAMODB_LOCAL_PORT,
        cancel,
        move |fixture| async move {
            // Deadline runs from here, after the image pull.
            let deadline = deadline_token(&parent, bootstrap_timeout);
            let _deadline_guard = deadline.clone().drop_guard();
            let store = connector.connect(fixture.endpoint()).await;
            info!(endpoint = %fixture.endpoint(), table = %table_name, "waiting for store");
            provision_when_ready(store.clone(), &definition, &table_name, &readiness, &deadline)
                .await?;
            let writer = ConditionalWriter::for_table(store, table_name.as_str(), &definition)
                .ok_or(BootstrapError::MissingSortKey)?;
            Ok::<_, RunError>(verify_put_if_absent(&writer, "HELLO").await?)
        },
    )
    .await
    .map_err(RunError::from);

    let closed = orchestrator.close().await;
    let report = result?;
    closed?;
    Ok(report)
}
