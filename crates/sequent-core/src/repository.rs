//! Repository traits implemented by the storage layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{EventRepositoryError, SnapshotError};
use crate::event::Event;
use crate::snapshot::AggregateSnapshot;

/// Durable append-only event log keyed by stream id and sequence id.
///
/// Implementations must enforce uniqueness of `(stream_id, sequence_id)`;
/// that constraint is the only serialization point between concurrent
/// appenders.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert a single event. Fails with
    /// [`EventRepositoryError::SequenceConflict`] if the event's
    /// `(stream_id, sequence_id)` slot is already taken.
    async fn insert(&self, event: &Event) -> Result<(), EventRepositoryError>;

    /// All events of a stream, ordered by ascending sequence id.
    async fn stream_events(&self, stream_id: Uuid) -> Result<Vec<Event>, EventRepositoryError>;

    /// Events of a stream with `sequence_id >= from`, ordered ascending.
    async fn stream_events_from(
        &self,
        stream_id: Uuid,
        from: i64,
    ) -> Result<Vec<Event>, EventRepositoryError>;

    /// Highest sequence id in the stream, 0 if the stream is empty or unknown.
    async fn current_sequence_id(&self, stream_id: Uuid) -> Result<i64, EventRepositoryError>;

    /// Distinct ids of all streams with at least one event.
    async fn stream_ids(&self) -> Result<Vec<Uuid>, EventRepositoryError>;
}

/// Store for point-in-time aggregate snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Latest snapshot (highest version id) for the stream and exact type
    /// name, or `None` when no snapshot under that name exists.
    async fn latest_snapshot(
        &self,
        stream_id: Uuid,
        type_name: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError>;

    /// Persist a snapshot. Stored snapshots are never mutated; newer ones
    /// supersede older ones by version id.
    async fn store_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), SnapshotError>;
}
