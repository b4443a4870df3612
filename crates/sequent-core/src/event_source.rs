//! Entry point wiring repositories, the stream manager, and the snapshot
//! service.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EventSourceConfig;
use crate::error::EventStreamError;
use crate::repository::{EventRepository, SnapshotRepository};
use crate::snapshot::{CountSnapshotStrategy, SnapshotStrategy};
use crate::snapshot_aware_stream::SnapshotAwareEventStream;
use crate::snapshot_service::SnapshotService;
use crate::stream::EnvelopeEventStream;
use crate::stream_manager::EventStreamManager;

/// Factory for snapshot-aware event streams sharing one stream manager and
/// one snapshot service.
///
/// Built once at startup and passed by reference to consumers; there is no
/// ambient registry.
pub struct EventSource {
    manager: Arc<EventStreamManager>,
    snapshot_service: Arc<SnapshotService>,
}

impl EventSource {
    /// Event source snapshotting on the default count strategy, with the
    /// threshold taken from `config`.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        clock: Arc<dyn Clock>,
        config: &EventSourceConfig,
    ) -> Self {
        let strategy = Arc::new(CountSnapshotStrategy::new(config.snapshot_threshold));
        Self::with_strategy(events, snapshots, strategy, clock, config)
    }

    /// Event source snapshotting on a caller-provided strategy.
    #[must_use]
    pub fn with_strategy(
        events: Arc<dyn EventRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        strategy: Arc<dyn SnapshotStrategy>,
        clock: Arc<dyn Clock>,
        config: &EventSourceConfig,
    ) -> Self {
        let manager = Arc::new(EventStreamManager::new(events, Arc::clone(&clock), config));
        let snapshot_service = Arc::new(SnapshotService::new(snapshots, strategy, clock));
        Self {
            manager,
            snapshot_service,
        }
    }

    /// Snapshot-aware stream facade for `stream_id`. Creating it performs no
    /// I/O; the stream may be empty or unknown.
    #[must_use]
    pub fn open_stream(&self, stream_id: Uuid) -> SnapshotAwareEventStream {
        SnapshotAwareEventStream::new(
            EnvelopeEventStream::new(Arc::clone(&self.manager), stream_id),
            Arc::clone(&self.snapshot_service),
        )
    }

    /// Distinct ids of every stream with at least one event.
    ///
    /// # Errors
    ///
    /// Returns [`EventStreamError::Repository`] when the listing fails.
    pub async fn stream_ids(&self) -> Result<Vec<Uuid>, EventStreamError> {
        self.manager.stream_ids().await
    }

    /// Shared snapshot service, e.g. to swap the snapshot deserializer at
    /// runtime.
    #[must_use]
    pub fn snapshot_service(&self) -> &Arc<SnapshotService> {
        &self.snapshot_service
    }
}
