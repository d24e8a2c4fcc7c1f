// Records as the conditional writer sees them.
//
// Purpose
// - Describe a store record independently of any SDK: a composite key plus typed attributes.
//
// Boundaries
// - Key attribute names belong to the table definition, not to the record. The writer
//   combines both when it builds the item sent to the store.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub partition: String,
    pub sort: String,
}

impl CompositeKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.partition, self.sort)
    }
}

/// Attribute names of the table's partition and sort keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNames {
    pub partition: String,
    pub sort: String,
}

pub type Item = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub key: CompositeKey,
    pub attributes: Item,
}

impl StoreRecord {
    pub fn new(key: CompositeKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Flattens key and attributes into a single item. Fails with the offending name when an
    /// attribute would shadow one of the key attributes.
    pub fn to_item(&self, keys: &KeyNames) -> Result<Item, String> {
        for name in [&keys.partition, &keys.sort] {
            if self.attributes.contains_key(name) {
                return Err(name.clone());
            }
        }
        let mut item = self.attributes.clone();
        item.insert(keys.partition.clone(), AttributeValue::S(self.key.partition.clone()));
        item.insert(keys.sort.clone(), AttributeValue::S(self.key.sort.clone()));
        Ok(item)
    }

    /// Splits a stored item back into key and attributes. Returns `None` when either key
    /// attribute is missing or is not a string.
    pub fn from_item(mut item: Item, keys: &KeyNames) -> Option<Self> {
        let partition = match item.remove(&keys.partition)? {
            AttributeValue::S(s) => s,
            _ => return None,
        };
        let sort = match item.remove(&keys.sort)? {
            AttributeValue::S(s) => s,
            _ => return None,
        };
        Some(Self {
            key: CompositeKey { partition, sort },
            attributes: item,
        })
    }
}
