//! Snapshot record and the snapshot cadence strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time serialized aggregate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Stream the state was folded from.
    pub stream_id: Uuid,
    /// Exact type name of the aggregate. Lookups never match across names.
    pub type_name: String,
    /// Sequence id of the last event folded into `state`.
    pub version_id: i64,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
    /// Timestamp of snapshot creation.
    pub created_at: DateTime<Utc>,
}

/// Decides whether a snapshot should be taken after an append.
pub trait SnapshotStrategy: Send + Sync {
    /// `events_since_snapshot` counts events past the latest snapshot, or
    /// since the start of the stream when none exists.
    fn should_snapshot(&self, events_since_snapshot: i64) -> bool;
}

/// Snapshots once every `threshold` events.
#[derive(Debug, Clone, Copy)]
pub struct CountSnapshotStrategy {
    threshold: i64,
}

impl CountSnapshotStrategy {
    /// Default event count between snapshots.
    pub const DEFAULT_THRESHOLD: i64 = 25;

    /// Strategy firing once `threshold` events accumulate past a snapshot.
    #[must_use]
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }
}

impl Default for CountSnapshotStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl SnapshotStrategy for CountSnapshotStrategy {
    fn should_snapshot(&self, events_since_snapshot: i64) -> bool {
        events_since_snapshot >= self.threshold
    }
}
