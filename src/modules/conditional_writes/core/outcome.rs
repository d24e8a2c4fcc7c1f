/// Result of a conditional write that the store processed.
///
/// Failures the store could not process are errors, never an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    ConditionFailed,
}

impl WriteOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created)
    }
}
