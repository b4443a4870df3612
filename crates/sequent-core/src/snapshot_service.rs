//! Conditional snapshot creation and lookup.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::clock::Clock;
use crate::error::SnapshotError;
use crate::repository::SnapshotRepository;
use crate::snapshot::{AggregateSnapshot, SnapshotStrategy};

/// Restores stored snapshot state into a value serde can decode an aggregate
/// from.
///
/// The default passes state through untouched; custom implementations migrate
/// state written by older aggregate versions into the current shape.
pub trait SnapshotDeserializer: Send + Sync {
    /// The state value to decode, given the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the stored state cannot be migrated.
    fn decode_state(&self, snapshot: &AggregateSnapshot) -> Result<serde_json::Value, SnapshotError>;
}

/// Pass-through deserializer for state written by the current aggregate
/// version.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshotDeserializer;

impl SnapshotDeserializer for JsonSnapshotDeserializer {
    fn decode_state(&self, snapshot: &AggregateSnapshot) -> Result<serde_json::Value, SnapshotError> {
        Ok(snapshot.state.clone())
    }
}

/// Orchestrates best-effort snapshot creation after appends and snapshot
/// lookup for rehydration.
pub struct SnapshotService {
    repository: Arc<dyn SnapshotRepository>,
    strategy: Arc<dyn SnapshotStrategy>,
    deserializer: RwLock<Arc<dyn SnapshotDeserializer>>,
    clock: Arc<dyn Clock>,
}

impl SnapshotService {
    /// Service over `repository`, snapshotting on `strategy`'s cadence, with
    /// the pass-through deserializer installed.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        strategy: Arc<dyn SnapshotStrategy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            strategy,
            deserializer: RwLock::new(Arc::new(JsonSnapshotDeserializer)),
            clock,
        }
    }

    /// Swaps the deserialization strategy at runtime. Applies to every
    /// subsequent [`latest_snapshot`](Self::latest_snapshot) call.
    pub async fn set_deserializer(&self, deserializer: Arc<dyn SnapshotDeserializer>) {
        *self.deserializer.write().await = deserializer;
    }

    /// Stores a snapshot of `aggregate` if the strategy calls for one at
    /// `new_version`.
    ///
    /// This never fails: the events that triggered it are already durable,
    /// so any problem here is logged at WARN and swallowed.
    pub async fn attempt_aggregate_store(
        &self,
        stream_id: Uuid,
        new_version: i64,
        aggregate: &dyn Aggregate,
    ) {
        if let Err(error) = self.store_if_due(stream_id, new_version, aggregate).await {
            warn!(
                stream_id = %stream_id,
                new_version,
                %error,
                "snapshot attempt failed, events remain committed"
            );
        }
    }

    async fn store_if_due(
        &self,
        stream_id: Uuid,
        new_version: i64,
        aggregate: &dyn Aggregate,
    ) -> Result<(), SnapshotError> {
        let type_name = aggregate.type_name();
        let latest = self.repository.latest_snapshot(stream_id, type_name).await?;
        let events_since = new_version - latest.as_ref().map_or(0, |s| s.version_id);
        if !self.strategy.should_snapshot(events_since) {
            return Ok(());
        }

        let state = aggregate
            .snapshot_state()
            .map_err(|error| SnapshotError::Serialization {
                stream_id,
                reason: error.to_string(),
            })?;
        let snapshot = AggregateSnapshot {
            stream_id,
            type_name: type_name.to_owned(),
            version_id: new_version,
            state,
            created_at: self.clock.now(),
        };
        self.repository.store_snapshot(&snapshot).await?;
        debug!(
            stream_id = %stream_id,
            type_name,
            version_id = new_version,
            "stored aggregate snapshot"
        );
        Ok(())
    }

    /// Latest stored snapshot for the stream and exact type name, with its
    /// state passed through the active deserializer.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the lookup fails or the deserializer
    /// rejects the stored state.
    pub async fn latest_snapshot(
        &self,
        stream_id: Uuid,
        type_name: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError> {
        let Some(mut snapshot) = self.repository.latest_snapshot(stream_id, type_name).await?
        else {
            return Ok(None);
        };
        snapshot.state = self.deserializer.read().await.decode_state(&snapshot)?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use sequent_test_support::{
        FailingSnapshotRepository, FixedClock, InMemorySnapshotRepository, RecordingAggregate,
        event_at,
    };
    use uuid::Uuid;

    use sequent_core::aggregate::Aggregate;
    use sequent_core::clock::Clock;
    use sequent_core::error::SnapshotError;
    use sequent_core::snapshot::{AggregateSnapshot, CountSnapshotStrategy};
    use sequent_core::snapshot_service::{SnapshotDeserializer, SnapshotService};

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ))
    }

    fn service(repository: Arc<InMemorySnapshotRepository>, threshold: i64) -> SnapshotService {
        SnapshotService::new(
            repository,
            Arc::new(CountSnapshotStrategy::new(threshold)),
            fixed_clock(),
        )
    }

    fn folded_aggregate(stream_id: Uuid, events: i64) -> RecordingAggregate {
        let mut aggregate = RecordingAggregate::default();
        for sequence_id in 1..=events {
            aggregate
                .apply_event(&event_at(stream_id, sequence_id, "ledger.entry_recorded"))
                .unwrap();
        }
        aggregate
    }

    #[tokio::test]
    async fn test_snapshot_stored_when_threshold_reached() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let service = service(Arc::clone(&repository), 25);
        let stream_id = Uuid::new_v4();
        let aggregate = folded_aggregate(stream_id, 25);

        // Act
        service.attempt_aggregate_store(stream_id, 25, &aggregate).await;

        // Assert
        assert_eq!(repository.snapshot_count(), 1);
        let stored = &repository.snapshots()[0];
        assert_eq!(stored.stream_id, stream_id);
        assert_eq!(stored.type_name, "RecordingAggregate");
        assert_eq!(stored.version_id, 25);
        assert_eq!(
            stored.created_at,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_no_snapshot_below_threshold() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let service = service(Arc::clone(&repository), 25);
        let stream_id = Uuid::new_v4();
        let aggregate = folded_aggregate(stream_id, 24);

        // Act
        service.attempt_aggregate_store(stream_id, 24, &aggregate).await;

        // Assert
        assert_eq!(repository.snapshot_count(), 0);
    }

    #[tokio::test]
    async fn test_events_since_counted_from_latest_snapshot() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let service = service(Arc::clone(&repository), 25);
        let stream_id = Uuid::new_v4();
        let aggregate = folded_aggregate(stream_id, 48);
        service
            .attempt_aggregate_store(stream_id, 25, &folded_aggregate(stream_id, 25))
            .await;
        assert_eq!(repository.snapshot_count(), 1);

        // Act: 23 events past the snapshot is below the threshold.
        service.attempt_aggregate_store(stream_id, 48, &aggregate).await;

        // Assert
        assert_eq!(repository.snapshot_count(), 1);

        // Act: 25 events past the snapshot fires again.
        let aggregate = folded_aggregate(stream_id, 50);
        service.attempt_aggregate_store(stream_id, 50, &aggregate).await;

        // Assert
        assert_eq!(repository.snapshot_count(), 2);
        assert_eq!(repository.snapshots()[1].version_id, 50);
    }

    #[tokio::test]
    async fn test_repository_failure_is_suppressed() {
        // Arrange
        let service = SnapshotService::new(
            Arc::new(FailingSnapshotRepository),
            Arc::new(CountSnapshotStrategy::new(1)),
            fixed_clock(),
        );
        let stream_id = Uuid::new_v4();
        let aggregate = folded_aggregate(stream_id, 5);

        // Act: both the lookup and the store fail; neither escapes.
        service.attempt_aggregate_store(stream_id, 5, &aggregate).await;
    }

    #[tokio::test]
    async fn test_latest_snapshot_uses_installed_deserializer() {
        // Arrange
        struct UppercasingDeserializer;

        impl SnapshotDeserializer for UppercasingDeserializer {
            fn decode_state(
                &self,
                snapshot: &AggregateSnapshot,
            ) -> Result<serde_json::Value, SnapshotError> {
                let mut state = snapshot.state.clone();
                state["marker"] = serde_json::json!("MIGRATED");
                Ok(state)
            }
        }

        let repository = Arc::new(InMemorySnapshotRepository::new());
        let service = service(Arc::clone(&repository), 1);
        let stream_id = Uuid::new_v4();
        repository.seed(AggregateSnapshot {
            stream_id,
            type_name: "RecordingAggregate".to_owned(),
            version_id: 3,
            state: serde_json::json!({"applied": []}),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        });

        // Act
        let before = service
            .latest_snapshot(stream_id, "RecordingAggregate")
            .await
            .unwrap()
            .unwrap();
        service.set_deserializer(Arc::new(UppercasingDeserializer)).await;
        let after = service
            .latest_snapshot(stream_id, "RecordingAggregate")
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert!(before.state.get("marker").is_none());
        assert_eq!(after.state["marker"], "MIGRATED");
    }

    #[tokio::test]
    async fn test_latest_snapshot_none_for_unknown_type_name() {
        // Arrange
        let repository = Arc::new(InMemorySnapshotRepository::new());
        let service = service(Arc::clone(&repository), 25);
        let stream_id = Uuid::new_v4();
        service
            .attempt_aggregate_store(stream_id, 25, &folded_aggregate(stream_id, 25))
            .await;

        // Act
        let found = service
            .latest_snapshot(stream_id, "RenamedAggregate")
            .await
            .unwrap();

        // Assert
        assert!(found.is_none());
    }
}
