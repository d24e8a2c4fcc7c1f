use crate::modules::conditional_writes::core::condition::ConditionalWriteRequest;
use crate::modules::conditional_writes::core::outcome::WriteOutcome;
use crate::modules::conditional_writes::core::record::{CompositeKey, Item, KeyNames};
use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::modules::conditional_writes::use_cases::load_schema::handler::SchemaError;
use crate::modules::conditional_writes::use_cases::verify_contract::handler::ContractError;
use crate::modules::ephemeral_store::fixture::orchestrator::FixtureError;
use crate::modules::ephemeral_store::readiness::gate::RetryError;
use crate::shared::infrastructure::key_value_store::in_memory::InMemoryKeyValueStore;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use crate::shared::infrastructure::sandbox::docker::DockerSandbox;
use crate::shared::infrastructure::sandbox::in_memory::InMemorySandbox;
use crate::shell::bootstrap::{BootstrapError, DynamoDbConnector, RunError, StoreConnector, run};
use crate::shell::config::AppConfig;
use crate::tests::fixtures::schema::{HASH_ONLY_SCHEMA_FIXTURE_PATH, SCHEMA_FIXTURE_PATH};
use async_trait::async_trait;
use rstest::{fixture, rstest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hands every fixture the same in-memory store.
struct InMemoryConnector {
    store: Arc<InMemoryKeyValueStore>,
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Store = InMemoryKeyValueStore;

    async fn connect(&self, _endpoint: &str) -> Arc<Self::Store> {
        self.store.clone()
    }
}

/// Accepts the table, then loses the connection before the first write.
#[derive(Default)]
struct FailingWritesStore {
    inner: InMemoryKeyValueStore,
}

#[async_trait]
impl KeyValueStore for FailingWritesStore {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        self.inner.create_table(definition).await
    }

    async fn put_item(&self, _request: ConditionalWriteRequest) -> Result<(), StoreError> {
        Err(StoreError::Unreachable {
            operation: "PutItem",
            message: "connection reset".to_string(),
        })
    }

    async fn get_item(
        &self,
        table_name: &str,
        keys: &KeyNames,
        key: &CompositeKey,
    ) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(table_name, keys, key).await
    }
}

struct FailingWritesConnector {
    store: Arc<FailingWritesStore>,
}

#[async_trait]
impl StoreConnector for FailingWritesConnector {
    type Store = FailingWritesStore;

    async fn connect(&self, _endpoint: &str) -> Arc<Self::Store> {
        self.store.clone()
    }
}

fn config_with(overrides: &[(&str, &str)]) -> AppConfig {
    let mut env: HashMap<String, String> = [
        ("SCHEMA_PATH", SCHEMA_FIXTURE_PATH),
        ("READINESS_MAX_ATTEMPTS", "5"),
        ("READINESS_INITIAL_BACKOFF_MS", "1"),
        ("READINESS_MAX_BACKOFF_MS", "2"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    env.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    AppConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

type BeforeEachReturn = (Arc<InMemorySandbox>, CancellationToken);

#[fixture]
fn before_each() -> BeforeEachReturn {
    (Arc::new(InMemorySandbox::new()), CancellationToken::new())
}

#[rstest]
#[tokio::test]
async fn it_should_verify_the_contract_once_the_store_warms_up(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let store = Arc::new(InMemoryKeyValueStore::warming_up(3));
    let connector = Arc::new(InMemoryConnector { store: store.clone() });

    let report = run(&config_with(&[]), sandbox.clone(), connector, &cancel)
        .await
        .expect("contract check failed");

    let steps: Vec<_> = report.steps.iter().map(|s| (s.key.clone(), s.outcome)).collect();
    assert_eq!(
        steps,
        vec![
            (CompositeKey::new("HELLO", "V1"), WriteOutcome::Created),
            (CompositeKey::new("HELLO", "V2"), WriteOutcome::Created),
            (CompositeKey::new("HELLO", "V1"), WriteOutcome::ConditionFailed),
        ]
    );
    assert_eq!(store.create_table_calls(), 4);
    assert_eq!(sandbox.total_purges().await, 1);
    assert_eq!(sandbox.running_count().await, 0);
}

#[rstest]
#[tokio::test]
async fn it_should_tear_down_when_the_store_never_becomes_ready(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let store = Arc::new(InMemoryKeyValueStore::warming_up(100));
    let connector = Arc::new(InMemoryConnector { store: store.clone() });

    let result = run(&config_with(&[]), sandbox.clone(), connector, &cancel).await;

    assert!(matches!(
        result,
        Err(RunError::Bootstrap(BootstrapError::NotReady(RetryError::Exhausted { attempts: 5, .. })))
    ));
    assert_eq!(store.create_table_calls(), 5);
    assert_eq!(sandbox.total_purges().await, 1);
    assert_eq!(sandbox.running_count().await, 0);
}

#[rstest]
#[tokio::test]
async fn it_should_not_start_a_fixture_for_an_unreadable_schema(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let connector = Arc::new(InMemoryConnector {
        store: Arc::new(InMemoryKeyValueStore::new()),
    });
    let config = config_with(&[("SCHEMA_PATH", "./src/tests/fixtures/json/missing.json")]);

    let result = run(&config, sandbox.clone(), connector, &cancel).await;

    assert!(matches!(
        result,
        Err(RunError::Bootstrap(BootstrapError::Schema(SchemaError::Unreadable { .. })))
    ));
    assert_eq!(sandbox.total_purges().await, 0);
}

#[rstest]
#[tokio::test]
async fn it_should_not_start_a_fixture_for_a_table_without_sort_key(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let connector = Arc::new(InMemoryConnector {
        store: Arc::new(InMemoryKeyValueStore::new()),
    });
    let config = config_with(&[("SCHEMA_PATH", HASH_ONLY_SCHEMA_FIXTURE_PATH)]);

    let result = run(&config, sandbox.clone(), connector, &cancel).await;

    assert!(matches!(result, Err(RunError::Bootstrap(BootstrapError::MissingSortKey))));
    assert_eq!(sandbox.total_purges().await, 0);
}

#[rstest]
#[tokio::test]
async fn it_should_fail_fast_when_the_sandbox_is_unreachable(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    sandbox.toggle_offline();
    let connector = Arc::new(InMemoryConnector {
        store: Arc::new(InMemoryKeyValueStore::new()),
    });

    let result = run(&config_with(&[]), sandbox.clone(), connector, &cancel).await;

    assert!(matches!(result, Err(RunError::Fixture(FixtureError::Sandbox(_)))));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn it_should_tear_down_when_cancelled_before_readiness(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let store = Arc::new(InMemoryKeyValueStore::warming_up(1000));
    let connector = Arc::new(InMemoryConnector { store: store.clone() });
    let config = config_with(&[
        ("READINESS_MAX_ATTEMPTS", "1000"),
        ("READINESS_INITIAL_BACKOFF_MS", "50"),
        ("READINESS_MAX_BACKOFF_MS", "50"),
    ]);
    let trigger = cancel.clone();
    let observed = store.clone();
    tokio::spawn(async move {
        while observed.create_table_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.cancel();
    });

    let result = run(&config, sandbox.clone(), connector, &cancel).await;

    // Whichever notices first: the fixture scope aborting the scenario, or the readiness gate.
    assert!(
        matches!(
            result,
            Err(RunError::Fixture(FixtureError::Cancelled))
                | Err(RunError::Bootstrap(BootstrapError::NotReady(RetryError::Cancelled { .. })))
        ),
        "{result:?}"
    );
    assert!(store.create_table_calls() < 1000);
    assert_eq!(sandbox.total_purges().await, 1);
    assert_eq!(sandbox.running_count().await, 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn it_should_not_count_a_slow_start_against_the_bootstrap_deadline() {
    let sandbox = Arc::new(InMemorySandbox::starting_slowly(Duration::from_secs(61)));
    let store = Arc::new(InMemoryKeyValueStore::new());
    let connector = Arc::new(InMemoryConnector { store: store.clone() });
    let config = config_with(&[("BOOTSTRAP_TIMEOUT_SECS", "60")]);

    let report = run(&config, sandbox.clone(), connector, &CancellationToken::new())
        .await
        .expect("contract check failed");

    assert_eq!(report.steps.len(), 3);
    assert_eq!(store.create_table_calls(), 1);
    assert_eq!(sandbox.total_purges().await, 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn it_should_stop_readiness_at_the_bootstrap_deadline(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let store = Arc::new(InMemoryKeyValueStore::warming_up(1000));
    let connector = Arc::new(InMemoryConnector { store: store.clone() });
    let config = config_with(&[
        ("BOOTSTRAP_TIMEOUT_SECS", "1"),
        ("READINESS_MAX_ATTEMPTS", "1000"),
        ("READINESS_INITIAL_BACKOFF_MS", "100"),
        ("READINESS_MAX_BACKOFF_MS", "100"),
    ]);

    let result = run(&config, sandbox.clone(), connector, &cancel).await;

    match result {
        Err(RunError::Bootstrap(BootstrapError::NotReady(RetryError::Cancelled { attempts }))) => {
            assert!(attempts > 1 && attempts < 1000, "attempts = {attempts}");
        }
        other => panic!("expected a cancelled readiness gate, got {other:?}"),
    }
    assert!(!cancel.is_cancelled());
    assert_eq!(sandbox.total_purges().await, 1);
    assert_eq!(sandbox.running_count().await, 0);
}

#[rstest]
#[tokio::test]
async fn it_should_tear_down_once_when_writes_fail(before_each: BeforeEachReturn) {
    let (sandbox, cancel) = before_each;
    let store = Arc::new(FailingWritesStore::default());
    let connector = Arc::new(FailingWritesConnector { store: store.clone() });

    let result = run(&config_with(&[]), sandbox.clone(), connector, &cancel).await;

    assert!(matches!(
        result,
        Err(RunError::Contract(ContractError::Store(StoreError::Unreachable { .. })))
    ));
    assert_eq!(store.inner.create_table_calls(), 1);
    assert_eq!(sandbox.total_purges().await, 1);
    assert_eq!(sandbox.running_count().await, 0);
}

#[rstest]
#[tokio::test]
#[ignore]
async fn integration_should_verify_the_contract_against_dynamodb_local(before_each: BeforeEachReturn) {
    let (_, cancel) = before_each;
    let config = config_with(&[
        ("READINESS_MAX_ATTEMPTS", "30"),
        ("READINESS_INITIAL_BACKOFF_MS", "500"),
        ("READINESS_MAX_BACKOFF_MS", "5000"),
    ]);
    let connector = Arc::new(DynamoDbConnector::new(config.store.clone()));

    let report = run(&config, Arc::new(DockerSandbox::new()), connector, &cancel)
        .await
        .expect("contract check against DynamoDB Local failed");

    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.steps[2].outcome, WriteOutcome::ConditionFailed);
}
