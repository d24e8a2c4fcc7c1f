// In memory implementation of the KeyValueStore port.
//
// Purpose
// - Support writer, provisioner and bootstrap tests without a container.
//
// Responsibilities
// - Keep tables and their items in memory, keyed by composite key.
// - Evaluate write conditions under the same lock as the write.
// - Simulate a store that is still starting up, or one that went offline.

use crate::modules::conditional_writes::core::condition::ConditionalWriteRequest;
use crate::modules::conditional_writes::core::record::{CompositeKey, Item, KeyNames};
use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    tables: RwLock<HashMap<String, HashMap<CompositeKey, Item>>>,
    warmup_remaining: AtomicUsize,
    create_table_calls: AtomicUsize,
    is_offline: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `calls` requests fail as `Unreachable`, like a store that has not
    /// started listening yet.
    pub fn warming_up(calls: usize) -> Self {
        Self {
            warmup_remaining: AtomicUsize::new(calls),
            ..Self::default()
        }
    }

    pub fn toggle_offline(&self) {
        self.is_offline.fetch_xor(true, Ordering::SeqCst);
    }

    pub fn create_table_calls(&self) -> usize {
        self.create_table_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.is_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable {
                operation,
                message: "store offline".to_string(),
            });
        }
        let warming = self
            .warmup_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if warming {
            return Err(StoreError::Unreachable {
                operation,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        const OP: &str = "CreateTable";
        self.create_table_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available(OP)?;
        let name = definition.table_name.clone().ok_or_else(|| StoreError::Validation {
            operation: OP,
            message: "table name is required".to_string(),
        })?;
        definition
            .validate()
            .map_err(|message| StoreError::Validation { operation: OP, message })?;
        let mut tables = self.tables.write().await;
        if tables.contains_key(&name) {
            return Err(StoreError::ResourceInUse {
                operation: OP,
                message: format!("table already exists: {name}"),
            });
        }
        tables.insert(name, HashMap::new());
        Ok(())
    }

    async fn put_item(&self, request: ConditionalWriteRequest) -> Result<(), StoreError> {
        const OP: &str = "PutItem";
        self.check_available(OP)?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| StoreError::ResourceNotFound {
                operation: OP,
                message: format!("table not found: {}", request.table_name),
            })?;
        if let Some(condition) = &request.condition {
            if !condition.holds_for(table.get(&request.key)) {
                return Err(StoreError::ConditionalCheckFailed { operation: OP });
            }
        }
        table.insert(request.key, request.item);
        Ok(())
    }

    async fn get_item(
        &self,
        table_name: &str,
        _keys: &KeyNames,
        key: &CompositeKey,
    ) -> Result<Option<Item>, StoreError> {
        const OP: &str = "GetItem";
        self.check_available(OP)?;
        let tables = self.tables.read().await;
        let table = tables.get(table_name).ok_or_else(|| StoreError::ResourceNotFound {
            operation: OP,
            message: format!("table not found: {table_name}"),
        })?;
        Ok(table.get(key).cloned())
    }
}

#[cfg(test)]
mod key_value_store_in_memory_tests {
    use super::*;
    use crate::modules::conditional_writes::core::condition::Condition;
    use crate::modules::conditional_writes::core::record::AttributeValue;
    use crate::tests::fixtures::schema::make_table_definition;
    use rstest::{fixture, rstest};

    const TABLE: &str = "testtable";

    fn request(sort: &str, condition: Option<Condition>) -> ConditionalWriteRequest {
        let mut item = Item::new();
        item.insert("PK".to_string(), AttributeValue::from("HELLO"));
        item.insert("SK".to_string(), AttributeValue::from(sort));
        ConditionalWriteRequest {
            table_name: TABLE.to_string(),
            key: CompositeKey::new("HELLO", sort),
            item,
            condition,
        }
    }

    #[fixture]
    fn keys() -> KeyNames {
        make_table_definition().key_names().unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_create_a_table_once() {
        let store = InMemoryKeyValueStore::new();
        let definition = make_table_definition().named(TABLE);
        store.create_table(&definition).await.expect("create failed");
        let second = store.create_table(&definition).await;
        assert!(matches!(second, Err(StoreError::ResourceInUse { .. })));
        assert_eq!(store.create_table_calls(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_reject_a_table_without_a_name() {
        let store = InMemoryKeyValueStore::new();
        let result = store.create_table(&make_table_definition()).await;
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_refuse_requests_while_warming_up() {
        let store = InMemoryKeyValueStore::warming_up(2);
        let definition = make_table_definition().named(TABLE);
        for _ in 0..2 {
            let result = store.create_table(&definition).await;
            assert!(matches!(result, Err(StoreError::Unreachable { .. })));
        }
        assert!(store.create_table(&definition).await.is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_put_and_get_an_item(keys: KeyNames) {
        let store = InMemoryKeyValueStore::new();
        store.create_table(&make_table_definition().named(TABLE)).await.unwrap();
        store.put_item(request("V1", None)).await.expect("put failed");
        let item = store
            .get_item(TABLE, &keys, &CompositeKey::new("HELLO", "V1"))
            .await
            .expect("get failed");
        assert_eq!(item.unwrap().get("SK"), Some(&AttributeValue::from("V1")));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_the_condition_for_an_existing_key() {
        let store = InMemoryKeyValueStore::new();
        store.create_table(&make_table_definition().named(TABLE)).await.unwrap();
        let condition = Some(Condition::AttributeNotExists("PK".to_string()));
        store.put_item(request("V1", condition.clone())).await.unwrap();
        let result = store.put_item(request("V1", condition)).await;
        assert!(matches!(result, Err(StoreError::ConditionalCheckFailed { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_overwrite_without_a_condition() {
        let store = InMemoryKeyValueStore::new();
        store.create_table(&make_table_definition().named(TABLE)).await.unwrap();
        store.put_item(request("V1", None)).await.unwrap();
        assert!(store.put_item(request("V1", None)).await.is_ok());
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_to_put_into_a_missing_table() {
        let store = InMemoryKeyValueStore::new();
        let result = store.put_item(request("V1", None)).await;
        assert!(matches!(result, Err(StoreError::ResourceNotFound { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_if_the_store_is_offline(keys: KeyNames) {
        let store = InMemoryKeyValueStore::new();
        store.toggle_offline();
        let result = store
            .get_item(TABLE, &keys, &CompositeKey::new("HELLO", "V1"))
            .await;
        assert!(result.unwrap_err().to_string().contains("store offline"));
    }
}
