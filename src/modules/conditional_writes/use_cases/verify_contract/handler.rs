// Insert-if-absent contract check against a provisioned table.
//
// Steps
// - (p, V1) must be created.
// - (p, V2) shares the partition key but not the sort key, so it must be created too.
// - (p, V1) again must fail its condition, and the stored record must still be the first one.

use crate::modules::conditional_writes::core::outcome::WriteOutcome;
use crate::modules::conditional_writes::core::record::{CompositeKey, StoreRecord};
use crate::modules::conditional_writes::use_cases::put_if_absent::handler::ConditionalWriter;
use crate::shared::infrastructure::key_value_store::{KeyValueStore, StoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("write #{attempt} of {key}: expected {expected:?}, got {actual:?}")]
    Violated {
        attempt: usize,
        key: CompositeKey,
        expected: WriteOutcome,
        actual: WriteOutcome,
    },

    #[error("record {key} was overwritten by a rejected write")]
    Overwritten { key: CompositeKey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractStep {
    pub key: CompositeKey,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractReport {
    pub steps: Vec<ContractStep>,
}

fn record(key: &CompositeKey, attempt: usize) -> StoreRecord {
    StoreRecord::new(key.clone())
        .with_attribute("attempt", attempt as i64)
        .with_attribute("written_at", chrono::Utc::now().to_rfc3339())
}

pub async fn verify_put_if_absent<TStore>(
    writer: &ConditionalWriter<TStore>,
    partition: &str,
) -> Result<ContractReport, ContractError>
where
    TStore: KeyValueStore + ?Sized,
{
    let first = CompositeKey::new(partition, "V1");
    let second = CompositeKey::new(partition, "V2");
    let plan = [
        (&first, WriteOutcome::Created),
        (&second, WriteOutcome::Created),
        (&first, WriteOutcome::ConditionFailed),
    ];

    let mut report = ContractReport::default();
    let mut original = None;
    for (index, (key, expected)) in plan.into_iter().enumerate() {
        let attempt = index + 1;
        let record = record(key, attempt);
        let actual = writer.put_if_absent(&record).await?;
        info!(attempt, key = %key, outcome = ?actual, "conditional write");
        if actual != expected {
            return Err(ContractError::Violated {
                attempt,
                key: key.clone(),
                expected,
                actual,
            });
        }
        if attempt == 1 {
            original = Some(record);
        }
        report.steps.push(ContractStep {
            key: key.clone(),
            outcome: actual,
        });
    }

    let stored = writer.get(&first).await?;
    if stored.is_none() || stored != original {
        return Err(ContractError::Overwritten { key: first });
    }
    Ok(report)
}
