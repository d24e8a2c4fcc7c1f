// Preconditions evaluated by the store together with a write.

use crate::modules::conditional_writes::core::record::{CompositeKey, Item};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeNotExists(String),
}

/// Expression text plus its placeholder table, ready to be sent as
/// `ConditionExpression` and `ExpressionAttributeNames`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCondition {
    pub expression: String,
    pub names: HashMap<String, String>,
}

impl Condition {
    // Attribute names go through placeholders so reserved words stay usable.
    pub fn render(&self) -> RenderedCondition {
        match self {
            Condition::AttributeNotExists(name) => RenderedCondition {
                expression: "attribute_not_exists(#0)".to_string(),
                names: HashMap::from([("#0".to_string(), name.clone())]),
            },
        }
    }

    /// Evaluates the condition against the item currently stored under the same key.
    pub fn holds_for(&self, existing: Option<&Item>) -> bool {
        match self {
            Condition::AttributeNotExists(name) => {
                existing.is_none_or(|item| !item.contains_key(name))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalWriteRequest {
    pub table_name: String,
    pub key: CompositeKey,
    pub item: Item,
    pub condition: Option<Condition>,
}
