//! Caller-facing stream API.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EventStreamError;
use crate::event::{Envelope, Event};
use crate::stream_manager::EventStreamManager;

/// Sequencing guarantee a caller asks of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Events must extend the version the manager read; conflicts surface
    /// to the caller.
    Consecutive,
    /// Bulk ingestion: conflicts are retried and sequence ids re-derived.
    /// State folded from such appends is not a replay checkpoint.
    NonConsecutive,
}

/// Ordered, append-only view of one stream.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Stream identifier.
    fn id(&self) -> Uuid;

    /// All events in sequence order.
    async fn read(&self) -> Result<Vec<Event>, EventStreamError>;

    /// Events with `sequence_id >= version`, in sequence order.
    async fn read_from(&self, version: i64) -> Result<Vec<Event>, EventStreamError>;

    /// Highest sequence id, 0 when the stream is empty.
    async fn current_version(&self) -> Result<i64, EventStreamError>;

    /// Append at the head of the stream; returns the new version.
    async fn append(&self, envelopes: Vec<Envelope>) -> Result<i64, EventStreamError>;

    /// Append only if the stream is still at `expected_version`.
    async fn append_after(
        &self,
        envelopes: Vec<Envelope>,
        expected_version: i64,
    ) -> Result<i64, EventStreamError>;

    /// Append with an explicit sequencing tolerance.
    async fn append_with_tolerance(
        &self,
        envelopes: Vec<Envelope>,
        tolerance: Tolerance,
    ) -> Result<i64, EventStreamError>;
}

/// Per-stream facade over the [`EventStreamManager`].
pub struct EnvelopeEventStream {
    manager: Arc<EventStreamManager>,
    stream_id: Uuid,
}

impl EnvelopeEventStream {
    /// Facade for `stream_id`. Creating it performs no I/O.
    #[must_use]
    pub fn new(manager: Arc<EventStreamManager>, stream_id: Uuid) -> Self {
        Self { manager, stream_id }
    }
}

#[async_trait]
impl EventStream for EnvelopeEventStream {
    fn id(&self) -> Uuid {
        self.stream_id
    }

    async fn read(&self) -> Result<Vec<Event>, EventStreamError> {
        self.manager.read(self.stream_id).await
    }

    async fn read_from(&self, version: i64) -> Result<Vec<Event>, EventStreamError> {
        self.manager.read_from(self.stream_id, version).await
    }

    async fn current_version(&self) -> Result<i64, EventStreamError> {
        self.manager.current_version(self.stream_id).await
    }

    async fn append(&self, envelopes: Vec<Envelope>) -> Result<i64, EventStreamError> {
        self.manager.append(self.stream_id, envelopes).await
    }

    async fn append_after(
        &self,
        envelopes: Vec<Envelope>,
        expected_version: i64,
    ) -> Result<i64, EventStreamError> {
        self.manager
            .append_after(self.stream_id, envelopes, expected_version)
            .await
    }

    async fn append_with_tolerance(
        &self,
        envelopes: Vec<Envelope>,
        tolerance: Tolerance,
    ) -> Result<i64, EventStreamError> {
        match tolerance {
            Tolerance::Consecutive => self.append(envelopes).await,
            Tolerance::NonConsecutive => {
                self.manager
                    .append_non_consecutively(self.stream_id, envelopes)
                    .await
            }
        }
    }
}
