//! End-to-end tests of the append, snapshot, and rehydration lifecycle
//! through an [`EventSource`].

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sequent_core::aggregate::Aggregate;
use sequent_core::aggregate_service::AggregateService;
use sequent_core::clock::Clock;
use sequent_core::config::EventSourceConfig;
use sequent_core::event_source::EventSource;
use sequent_core::repository::SnapshotRepository;
use sequent_core::stream::{EventStream, Tolerance};
use sequent_test_support::{
    FailingSnapshotRepository, FixedClock, InMemoryEventRepository, InMemorySnapshotRepository,
    RecordingAggregate, envelope, event_at, init_tracing,
};
use tokio::sync::Mutex;
use uuid::Uuid;

fn event_source(snapshots: Arc<dyn SnapshotRepository>) -> EventSource {
    init_tracing();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    EventSource::new(
        Arc::new(InMemoryEventRepository::new()),
        snapshots,
        clock,
        &EventSourceConfig::default(),
    )
}

/// Appends `count` single-event batches, folding each event into `aggregate`
/// first, the way a command handler records what it is about to append.
async fn record_entries(
    stream: &impl EventStream,
    aggregate: &Arc<Mutex<RecordingAggregate>>,
    count: i64,
) {
    let start = stream.current_version().await.unwrap();
    for sequence_id in start + 1..=start + count {
        aggregate
            .lock()
            .await
            .apply_event(&event_at(stream.id(), sequence_id, "ledger.entry_recorded"))
            .unwrap();
        stream
            .append(vec![envelope("ledger.entry_recorded")])
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_snapshot_cadence_at_default_threshold() {
    // Arrange: default threshold is 25.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let source = event_source(Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>);
    let stream = source.open_stream(Uuid::new_v4());
    let aggregate = Arc::new(Mutex::new(RecordingAggregate::default()));
    stream.register_aggregate(Arc::clone(&aggregate) as Arc<Mutex<dyn Aggregate>>).await;

    // Act: 25 events cross the threshold.
    record_entries(&stream, &aggregate, 25).await;

    // Assert
    assert_eq!(stream.current_version().await.unwrap(), 25);
    assert_eq!(snapshots.snapshot_count(), 1);
    assert_eq!(snapshots.snapshots()[0].version_id, 25);

    // Act: 23 more stay 2 short of the next threshold.
    record_entries(&stream, &aggregate, 23).await;

    // Assert
    assert_eq!(stream.current_version().await.unwrap(), 48);
    assert_eq!(snapshots.snapshot_count(), 1);

    // Act: 2 more complete the second cadence.
    record_entries(&stream, &aggregate, 2).await;

    // Assert
    assert_eq!(stream.current_version().await.unwrap(), 50);
    assert_eq!(snapshots.snapshot_count(), 2);
    assert_eq!(snapshots.snapshots()[1].version_id, 50);
}

#[tokio::test]
async fn test_rehydration_from_snapshot_matches_full_replay() {
    // Arrange: 30 events leave a snapshot at version 25 plus a 5-event tail.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let source = event_source(Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>);
    let stream = source.open_stream(Uuid::new_v4());
    let aggregate = Arc::new(Mutex::new(RecordingAggregate::default()));
    stream.register_aggregate(Arc::clone(&aggregate) as Arc<Mutex<dyn Aggregate>>).await;
    record_entries(&stream, &aggregate, 30).await;
    assert_eq!(snapshots.snapshot_count(), 1);

    // Act
    let service = AggregateService::new(Arc::clone(source.snapshot_service()));
    let from_snapshot: RecordingAggregate = service.rehydrate(&stream).await.unwrap();

    // Assert: identical to folding every event from scratch.
    let mut from_scratch = RecordingAggregate::default();
    for event in stream.read().await.unwrap() {
        from_scratch.apply_event(&event).unwrap();
    }
    assert_eq!(from_snapshot, from_scratch);
    assert_eq!(from_snapshot.applied_event_count(), 30);
}

#[tokio::test]
async fn test_non_consecutive_appends_never_snapshot() {
    // Arrange
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let source = event_source(Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>);
    let stream = source.open_stream(Uuid::new_v4());
    stream
        .register_aggregate(Arc::new(Mutex::new(RecordingAggregate::default())))
        .await;

    // Act: bulk ingestion far past the threshold.
    let batch: Vec<_> = (0..60).map(|_| envelope("ledger.bulk_imported")).collect();
    let version = stream
        .append_with_tolerance(batch, Tolerance::NonConsecutive)
        .await
        .unwrap();

    // Assert
    assert_eq!(version, 60);
    assert_eq!(snapshots.snapshot_count(), 0);
}

#[tokio::test]
async fn test_appends_and_rehydration_survive_a_broken_snapshot_store() {
    // Arrange
    let source = event_source(Arc::new(FailingSnapshotRepository));
    let stream = source.open_stream(Uuid::new_v4());
    let aggregate = Arc::new(Mutex::new(RecordingAggregate::default()));
    stream.register_aggregate(Arc::clone(&aggregate) as Arc<Mutex<dyn Aggregate>>).await;

    // Act: every snapshot attempt fails; the appends must not notice.
    record_entries(&stream, &aggregate, 26).await;

    // Assert
    assert_eq!(stream.current_version().await.unwrap(), 26);
    let service = AggregateService::new(Arc::clone(source.snapshot_service()));
    let rehydrated: RecordingAggregate = service.rehydrate(&stream).await.unwrap();
    assert_eq!(rehydrated.applied_event_count(), 26);
}

#[tokio::test]
async fn test_configured_threshold_drives_the_default_strategy() {
    // Arrange
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    init_tracing();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let config = EventSourceConfig {
        snapshot_threshold: 5,
        ..EventSourceConfig::default()
    };
    let source = EventSource::new(
        Arc::new(InMemoryEventRepository::new()),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        clock,
        &config,
    );
    let stream = source.open_stream(Uuid::new_v4());
    let aggregate = Arc::new(Mutex::new(RecordingAggregate::default()));
    stream.register_aggregate(Arc::clone(&aggregate) as Arc<Mutex<dyn Aggregate>>).await;

    // Act
    record_entries(&stream, &aggregate, 10).await;

    // Assert: one snapshot per 5 events.
    assert_eq!(snapshots.snapshot_count(), 2);
    assert_eq!(snapshots.snapshots()[0].version_id, 5);
    assert_eq!(snapshots.snapshots()[1].version_id, 10);
}
