//! DynamoDB implementation of the `KeyValueStore` port.
//!
//! The client is built from an explicit [`DynamoDbClientConfig`]; the endpoint of an
//! ephemeral instance is passed in as `endpoint_override` instead of being discovered.

use crate::modules::conditional_writes::core::condition::ConditionalWriteRequest;
use crate::modules::conditional_writes::core::record::{AttributeValue, CompositeKey, Item, KeyNames};
use crate::modules::conditional_writes::core::table_definition::TableDefinition;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::{self as ddb};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the DynamoDB client.
#[derive(Debug, Clone)]
pub struct DynamoDbClientConfig {
    /// Endpoint to talk to instead of the regional AWS endpoint (e.g. DynamoDB Local)
    pub endpoint_override: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Per-operation timeout
    pub operation_timeout: Duration,
}

impl DynamoDbClientConfig {
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint_override: Some(endpoint.into()),
            ..self.clone()
        }
    }
}

#[derive(Clone)]
pub struct DynamoDbKeyValueStore {
    client: Client,
}

impl std::fmt::Debug for DynamoDbKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbKeyValueStore").finish_non_exhaustive()
    }
}

impl DynamoDbKeyValueStore {
    pub async fn connect(config: &DynamoDbClientConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "put_if_absent",
        );
        // Retries belong to the readiness gate; the SDK must surface the first failure.
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.operation_timeout)
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint_override {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self {
            client: Client::new(&sdk_config),
        }
    }

    /// Create from a pre-built client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn build_error(operation: &'static str, err: impl std::fmt::Display) -> StoreError {
        StoreError::Validation {
            operation,
            message: err.to_string(),
        }
    }

    /// Sort an SDK failure into the store error taxonomy.
    fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> StoreError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        let message = DisplayErrorContext(&err).to_string();
        match &err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                StoreError::Unreachable { operation, message }
            }
            SdkError::ConstructionFailure(_) => StoreError::Validation { operation, message },
            SdkError::ServiceError(service_err) => match service_err.err().code() {
                Some("ConditionalCheckFailedException") => {
                    StoreError::ConditionalCheckFailed { operation }
                }
                Some("ResourceNotFoundException") => StoreError::ResourceNotFound { operation, message },
                Some("ResourceInUseException") => StoreError::ResourceInUse { operation, message },
                Some("ValidationException") | Some("SerializationException") => {
                    StoreError::Validation { operation, message }
                }
                Some("ProvisionedThroughputExceededException")
                | Some("ThrottlingException")
                | Some("RequestLimitExceeded")
                | Some("LimitExceededException") => StoreError::Throttled { operation, message },
                Some("UnrecognizedClientException")
                | Some("AccessDeniedException")
                | Some("MissingAuthenticationTokenException") => {
                    StoreError::Unauthorized { operation, message }
                }
                _ => StoreError::Backend { operation, message },
            },
            _ => StoreError::Backend { operation, message },
        }
    }

    fn is_put_conditional_check_failed<R>(err: &SdkError<PutItemError, R>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => {
                matches!(service_err.err(), PutItemError::ConditionalCheckFailedException(_))
            }
            _ => false,
        }
    }

    fn to_dynamo_attr(value: &AttributeValue) -> ddb::AttributeValue {
        match value {
            AttributeValue::S(s) => ddb::AttributeValue::S(s.clone()),
            AttributeValue::N(n) => ddb::AttributeValue::N(n.clone()),
            AttributeValue::Bool(b) => ddb::AttributeValue::Bool(*b),
            AttributeValue::Null => ddb::AttributeValue::Null(true),
            AttributeValue::L(list) => {
                ddb::AttributeValue::L(list.iter().map(Self::to_dynamo_attr).collect())
            }
            AttributeValue::M(map) => ddb::AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::to_dynamo_attr(v)))
                    .collect(),
            ),
        }
    }

    fn from_dynamo_attr(value: &ddb::AttributeValue) -> Option<AttributeValue> {
        match value {
            ddb::AttributeValue::S(s) => Some(AttributeValue::S(s.clone())),
            ddb::AttributeValue::N(n) => Some(AttributeValue::N(n.clone())),
            ddb::AttributeValue::Bool(b) => Some(AttributeValue::Bool(*b)),
            ddb::AttributeValue::Null(_) => Some(AttributeValue::Null),
            ddb::AttributeValue::L(list) => Some(AttributeValue::L(
                list.iter().filter_map(Self::from_dynamo_attr).collect(),
            )),
            ddb::AttributeValue::M(map) => Some(AttributeValue::M(
                map.iter()
                    .filter_map(|(k, v)| Self::from_dynamo_attr(v).map(|val| (k.clone(), val)))
                    .collect(),
            )),
            other => {
                debug!(value = ?other, "skipping binary or set attribute");
                None
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbKeyValueStore {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        const OP: &str = "CreateTable";
        let mut request = self
            .client
            .create_table()
            .set_table_name(definition.table_name.clone())
            .billing_mode(ddb::BillingMode::from(definition.billing_mode().as_str()));

        for attribute in &definition.attribute_definitions {
            let attribute = ddb::AttributeDefinition::builder()
                .attribute_name(&attribute.attribute_name)
                .attribute_type(ddb::ScalarAttributeType::from(attribute.attribute_type.as_str()))
                .build()
                .map_err(|e| Self::build_error(OP, e))?;
            request = request.attribute_definitions(attribute);
        }
        for key in &definition.key_schema {
            let key = ddb::KeySchemaElement::builder()
                .attribute_name(&key.attribute_name)
                .key_type(ddb::KeyType::from(key.key_type.as_str()))
                .build()
                .map_err(|e| Self::build_error(OP, e))?;
            request = request.key_schema(key);
        }
        if let Some(throughput) = definition.provisioned_throughput {
            let throughput = ddb::ProvisionedThroughput::builder()
                .read_capacity_units(throughput.read_capacity_units)
                .write_capacity_units(throughput.write_capacity_units)
                .build()
                .map_err(|e| Self::build_error(OP, e))?;
            request = request.provisioned_throughput(throughput);
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Self::classify(OP, e))
    }

    async fn put_item(&self, request: ConditionalWriteRequest) -> Result<(), StoreError> {
        const OP: &str = "PutItem";
        let item: HashMap<String, ddb::AttributeValue> = request
            .item
            .iter()
            .map(|(k, v)| (k.clone(), Self::to_dynamo_attr(v)))
            .collect();
        let mut put = self
            .client
            .put_item()
            .table_name(&request.table_name)
            .set_item(Some(item));
        if let Some(condition) = &request.condition {
            let rendered = condition.render();
            put = put
                .condition_expression(rendered.expression)
                .set_expression_attribute_names(Some(rendered.names));
        }

        match put.send().await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_put_conditional_check_failed(&e) => {
                Err(StoreError::ConditionalCheckFailed { operation: OP })
            }
            Err(e) => Err(Self::classify(OP, e)),
        }
    }

    async fn get_item(
        &self,
        table_name: &str,
        keys: &KeyNames,
        key: &CompositeKey,
    ) -> Result<Option<Item>, StoreError> {
        const OP: &str = "GetItem";
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .key(&keys.partition, ddb::AttributeValue::S(key.partition.clone()))
            .key(&keys.sort, ddb::AttributeValue::S(key.sort.clone()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Self::classify(OP, e))?;

        Ok(output.item().map(|item| {
            item.iter()
                .filter_map(|(k, v)| Self::from_dynamo_attr(v).map(|val| (k.clone(), val)))
                .collect()
        }))
    }
}
