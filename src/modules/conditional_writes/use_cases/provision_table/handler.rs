// Table provisioner: one CreateTable request for a loaded definition under a runtime name.
//
// Whatever the store reports is returned unchanged; deciding whether a failure is worth
// another attempt is left to the caller's retry policy.

use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use std::sync::Arc;

pub struct TableProvisioner<TStore>
where
    TStore: KeyValueStore + ?Sized,
{
    store: Arc<TStore>,
}

impl<TStore> TableProvisioner<TStore>
where
    TStore: KeyValueStore + ?Sized,
{
    pub fn new(store: Arc<TStore>) -> Self {
        Self { store }
    }

    pub async fn provision(
        &self,
        definition: &TableDefinition,
        table_name: &str,
    ) -> Result<(), StoreError> {
        self.store.create_table(&definition.named(table_name)).await?;
        tracing::info!(table = table_name, "table created");
        Ok(())
    }
}
