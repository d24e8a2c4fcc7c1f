// Conditional writer.
//
// Purpose
// - Insert a record only if no record with the same composite key exists.
//
// Responsibilities
// - Send record and precondition as one request; the store evaluates both atomically, so no
//   read happens before the write.
// - Report a failed precondition as an outcome and every other failure as an error.

use crate::modules::conditional_writes::core::condition::{Condition, ConditionalWriteRequest};
use crate::modules::conditional_writes::core::outcome::WriteOutcome;
use crate::modules::conditional_writes::core::record::{CompositeKey, KeyNames, StoreRecord};
use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConditionalWriter<TStore>
where
    TStore: KeyValueStore + ?Sized,
{
    store: Arc<TStore>,
    table_name: String,
    keys: KeyNames,
}

impl<TStore> ConditionalWriter<TStore>
where
    TStore: KeyValueStore + ?Sized,
{
    pub fn new(store: Arc<TStore>, table_name: impl Into<String>, keys: KeyNames) -> Self {
        Self {
            store,
            table_name: table_name.into(),
            keys,
        }
    }

    /// Writer for a table built from `definition`; `None` if the table has no sort key.
    pub fn for_table(
        store: Arc<TStore>,
        table_name: impl Into<String>,
        definition: &TableDefinition,
    ) -> Option<Self> {
        Some(Self::new(store, table_name, definition.key_names()?))
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn request_for(&self, record: &StoreRecord) -> Result<ConditionalWriteRequest, StoreError> {
        let item = record.to_item(&self.keys).map_err(|name| StoreError::Validation {
            operation: "PutItem",
            message: format!("attribute {name} shadows a key attribute"),
        })?;
        Ok(ConditionalWriteRequest {
            table_name: self.table_name.clone(),
            key: record.key.clone(),
            item,
            condition: Some(Condition::AttributeNotExists(self.keys.partition.clone())),
        })
    }

    pub async fn put_if_absent(&self, record: &StoreRecord) -> Result<WriteOutcome, StoreError> {
        let request = self.request_for(record)?;
        match self.store.put_item(request).await {
            Ok(()) => {
                info!(table = %self.table_name, key = %record.key, "record created");
                Ok(WriteOutcome::Created)
            }
            Err(StoreError::ConditionalCheckFailed { .. }) => {
                info!(table = %self.table_name, key = %record.key, "record already exists");
                Ok(WriteOutcome::ConditionFailed)
            }
            Err(e) => {
                debug!(table = %self.table_name, key = %record.key, error = %e, "put failed");
                Err(e)
            }
        }
    }

    /// Reads a record back with a strongly consistent read.
    pub async fn get(&self, key: &CompositeKey) -> Result<Option<StoreRecord>, StoreError> {
        let item = self.store.get_item(&self.table_name, &self.keys, key).await?;
        Ok(item.and_then(|item| StoreRecord::from_item(item, &self.keys)))
    }
}
