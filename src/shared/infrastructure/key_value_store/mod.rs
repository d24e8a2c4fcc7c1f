use crate::modules::conditional_writes::core::condition::ConditionalWriteRequest;
use crate::modules::conditional_writes::core::record::{CompositeKey, Item, KeyNames};
use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conditional check failed in {operation}")]
    ConditionalCheckFailed { operation: &'static str },

    #[error("{operation}: store unreachable: {message}")]
    Unreachable {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: resource not found: {message}")]
    ResourceNotFound {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: resource in use: {message}")]
    ResourceInUse {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: validation failed: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: throttled: {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: unauthorized: {message}")]
    Unauthorized {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: backend error: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            StoreError::ConditionalCheckFailed { operation }
            | StoreError::Unreachable { operation, .. }
            | StoreError::ResourceNotFound { operation, .. }
            | StoreError::ResourceInUse { operation, .. }
            | StoreError::Validation { operation, .. }
            | StoreError::Throttled { operation, .. }
            | StoreError::Unauthorized { operation, .. }
            | StoreError::Backend { operation, .. } => operation,
        }
    }

    /// Errors a store that is still starting up plausibly returns.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unreachable { .. }
                | StoreError::ResourceNotFound { .. }
                | StoreError::Throttled { .. }
        )
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError>;

    /// Writes `request.item`. When `request.condition` is set, the store evaluates it against
    /// the currently stored item atomically with the write and fails with
    /// `StoreError::ConditionalCheckFailed` if it does not hold.
    async fn put_item(&self, request: ConditionalWriteRequest) -> Result<(), StoreError>;

    async fn get_item(
        &self,
        table_name: &str,
        keys: &KeyNames,
        key: &CompositeKey,
    ) -> Result<Option<Item>, StoreError>;
}

pub mod dynamodb;
pub mod in_memory;
