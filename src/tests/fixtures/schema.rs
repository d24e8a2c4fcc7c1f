// Shared table definition fixture, identical to the JSON schema fixture on disk.

use crate::modules::conditional_writes::core::table_definition::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableDefinition,
};

pub const SCHEMA_FIXTURE_PATH: &str = "./src/tests/fixtures/json/schema.json";
pub const HASH_ONLY_SCHEMA_FIXTURE_PATH: &str = "./src/tests/fixtures/json/hash_only_schema.json";

pub fn make_table_definition() -> TableDefinition {
    TableDefinition {
        table_name: None,
        attribute_definitions: vec![
            AttributeDefinition {
                attribute_name: "PK".to_string(),
                attribute_type: ScalarAttributeType::S,
            },
            AttributeDefinition {
                attribute_name: "SK".to_string(),
                attribute_type: ScalarAttributeType::S,
            },
        ],
        key_schema: vec![
            KeySchemaElement {
                attribute_name: "PK".to_string(),
                key_type: KeyType::Hash,
            },
            KeySchemaElement {
                attribute_name: "SK".to_string(),
                key_type: KeyType::Range,
            },
        ],
        billing_mode: Some(BillingMode::Provisioned),
        provisioned_throughput: Some(ProvisionedThroughput {
            read_capacity_units: 5,
            write_capacity_units: 5,
        }),
    }
}
