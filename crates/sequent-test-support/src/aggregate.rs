//! Test aggregate — records every event it folds.

use sequent_core::aggregate::Aggregate;
use sequent_core::error::AggregateError;
use sequent_core::event::Event;
use serde::{Deserialize, Serialize};

/// Aggregate that records the name of every event applied to it, in order.
/// Its serialized state round-trips through snapshots unchanged, which makes
/// snapshot-versus-replay comparisons a plain equality check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingAggregate {
    /// Names of every event folded in, oldest first.
    pub applied: Vec<String>,
}

impl Aggregate for RecordingAggregate {
    fn type_name(&self) -> &str {
        "RecordingAggregate"
    }

    fn apply_event(&mut self, event: &Event) -> Result<(), AggregateError> {
        self.applied.push(event.name.clone());
        Ok(())
    }

    fn applied_event_count(&self) -> i64 {
        i64::try_from(self.applied.len()).unwrap_or(i64::MAX)
    }

    fn snapshot_state(&self) -> Result<serde_json::Value, AggregateError> {
        serde_json::to_value(self).map_err(|error| AggregateError::State(error.to_string()))
    }
}
