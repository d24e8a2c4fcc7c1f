use crate::modules::conditional_writes::core::record::{CompositeKey, StoreRecord};

pub fn make_record(partition: &str, sort: &str) -> StoreRecord {
    StoreRecord::new(CompositeKey::new(partition, sort)).with_attribute("source", "fixture")
}
