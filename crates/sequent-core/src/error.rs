//! Error types for the append, snapshot, and replay paths.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by stream reads and appends.
#[derive(Debug, Error)]
pub enum EventStreamError {
    /// The caller expected a version beyond the head of the stream. This is a
    /// caller logic error and is never retried.
    #[error("version mismatch appending to stream {stream_id}: expected {expected}, found {actual}")]
    VersionMismatch {
        /// Stream the append targeted.
        stream_id: Uuid,
        /// Version the caller expected the stream to be at.
        expected: i64,
        /// Version the stream was actually at.
        actual: i64,
    },

    /// A concurrent writer advanced the stream past the version this append
    /// was derived from. Safe to retry after re-reading the current version.
    #[error("optimistic lock failure storing version {version} of stream {stream_id}, which is already at {current}")]
    OptimisticLock {
        /// Stream the append targeted.
        stream_id: Uuid,
        /// Version this append tried to store.
        version: i64,
        /// Version the stream had advanced to.
        current: i64,
    },

    /// An envelope arrived with its version already assigned. Versions are
    /// assigned by the stream manager, never by callers.
    #[error("cannot append to stream {stream_id}: envelope version must be empty")]
    VersionAlreadyAssigned {
        /// Stream the append targeted.
        stream_id: Uuid,
    },

    /// The underlying event repository failed.
    #[error(transparent)]
    Repository(#[from] EventRepositoryError),
}

impl EventStreamError {
    /// True only for the optimistic-lock conflict, the one variant a caller
    /// may retry after re-reading the current version.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OptimisticLock { .. })
    }
}

/// Errors reported by event repository implementations.
#[derive(Debug, Error)]
pub enum EventRepositoryError {
    /// The `(stream_id, sequence_id)` slot is already taken. This is the
    /// uniqueness-constraint signal the stream manager converts into an
    /// optimistic-lock conflict.
    #[error("sequence id {sequence_id} already exists in stream {stream_id}")]
    SequenceConflict {
        /// Stream holding the contested slot.
        stream_id: Uuid,
        /// Sequence id that was already taken.
        sequence_id: i64,
    },

    /// Storage or connectivity failure.
    #[error("event storage error: {0}")]
    Storage(String),
}

/// Errors reported while reading or writing snapshots. Inside the snapshot
/// service these are logged and suppressed; they never abort an append.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Aggregate state could not be serialized for storage.
    #[error("snapshot state serialization failed for stream {stream_id}: {reason}")]
    Serialization {
        /// Stream the snapshot was for.
        stream_id: Uuid,
        /// Underlying serializer message.
        reason: String,
    },

    /// Storage or connectivity failure.
    #[error("snapshot storage error: {0}")]
    Storage(String),
}

/// Errors raised by aggregates while folding events.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// No apply function is registered for the event name.
    #[error("no apply function registered for event {name}")]
    UnroutableEvent {
        /// Name the dispatch table could not route.
        name: String,
    },

    /// Aggregate state could not be encoded or decoded.
    #[error("aggregate state codec failure: {0}")]
    State(String),
}

/// Errors surfaced while rebuilding an aggregate from a stream.
#[derive(Debug, Error)]
pub enum RehydrationError {
    /// Reading the stream failed.
    #[error(transparent)]
    Stream(#[from] EventStreamError),

    /// The aggregate rejected an event during replay.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable that was set.
        key: &'static str,
        /// Raw value found.
        value: String,
        /// Parser message.
        reason: String,
    },
}
