// Static table definition consumed when the table is provisioned.
//
// Purpose
// - Mirror the CreateTable request shape that schema files are written in (PascalCase keys).
//
// Responsibilities
// - Check the structural rules the store would otherwise reject the request for.
// - Refuse fields outside the modelled subset instead of creating a different table.
// - Bind the runtime table name by producing a renamed copy; a loaded definition never changes.

use crate::modules::conditional_writes::core::record::KeyNames;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    S,
    N,
    B,
}

impl ScalarAttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarAttributeType::S => "S",
            ScalarAttributeType::N => "N",
            ScalarAttributeType::B => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Hash,
    Range,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Hash => "HASH",
            KeyType::Range => "RANGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    #[default]
    Provisioned,
    PayPerRequest,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Provisioned => "PROVISIONED",
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarAttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TableDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<BillingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

impl TableDefinition {
    pub fn billing_mode(&self) -> BillingMode {
        self.billing_mode.unwrap_or_default()
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.key_of(KeyType::Hash)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.key_of(KeyType::Range)
    }

    fn key_of(&self, key_type: KeyType) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|k| k.key_type == key_type)
            .map(|k| k.attribute_name.as_str())
    }

    /// Both key names, or `None` for a table keyed by partition only.
    pub fn key_names(&self) -> Option<KeyNames> {
        Some(KeyNames {
            partition: self.partition_key()?.to_string(),
            sort: self.sort_key()?.to_string(),
        })
    }

    pub fn named(&self, table_name: impl Into<String>) -> Self {
        Self {
            table_name: Some(table_name.into()),
            ..self.clone()
        }
    }

    /// Returns a description of the first rule the definition breaks.
    pub fn validate(&self) -> Result<(), String> {
        let hash_keys = self.key_schema.iter().filter(|k| k.key_type == KeyType::Hash).count();
        if hash_keys != 1 {
            return Err(format!("key schema needs exactly one HASH key, found {hash_keys}"));
        }
        let range_keys = self.key_schema.iter().filter(|k| k.key_type == KeyType::Range).count();
        if range_keys > 1 {
            return Err(format!("key schema allows at most one RANGE key, found {range_keys}"));
        }
        for key in &self.key_schema {
            if !self
                .attribute_definitions
                .iter()
                .any(|a| a.attribute_name == key.attribute_name)
            {
                return Err(format!(
                    "key attribute {} has no attribute definition",
                    key.attribute_name
                ));
            }
        }
        match (self.billing_mode(), self.provisioned_throughput) {
            (BillingMode::Provisioned, None) => {
                Err("PROVISIONED billing requires ProvisionedThroughput".to_string())
            }
            (BillingMode::Provisioned, Some(t))
                if t.read_capacity_units < 1 || t.write_capacity_units < 1 =>
            {
                Err("provisioned capacity units must be positive".to_string())
            }
            _ => Ok(()),
        }
    }
}
