//! Test repositories — mock `EventRepository` and `SnapshotRepository`
//! implementations for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use sequent_core::error::{EventRepositoryError, SnapshotError};
use sequent_core::event::Event;
use sequent_core::repository::{EventRepository, SnapshotRepository};
use sequent_core::snapshot::AggregateSnapshot;
use uuid::Uuid;

use crate::envelope::event_at;

/// An event repository backed by a map of streams, enforcing the
/// `(stream_id, sequence_id)` uniqueness constraint the way a real store
/// would.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<HashMap<Uuid, Vec<Event>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), EventRepositoryError> {
        let mut streams = self.streams.lock().unwrap();
        let events = streams.entry(event.stream_id).or_default();
        if events.iter().any(|e| e.sequence_id == event.sequence_id) {
            return Err(EventRepositoryError::SequenceConflict {
                stream_id: event.stream_id,
                sequence_id: event.sequence_id,
            });
        }
        events.push(event.clone());
        events.sort_by_key(|e| e.sequence_id);
        Ok(())
    }

    async fn stream_events(&self, stream_id: Uuid) -> Result<Vec<Event>, EventRepositoryError> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(&stream_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn stream_events_from(
        &self,
        stream_id: Uuid,
        from: i64,
    ) -> Result<Vec<Event>, EventRepositoryError> {
        let events = self.stream_events(stream_id).await?;
        Ok(events.into_iter().filter(|e| e.sequence_id >= from).collect())
    }

    async fn current_sequence_id(&self, stream_id: Uuid) -> Result<i64, EventRepositoryError> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(&stream_id)
            .and_then(|events| events.last())
            .map_or(0, |event| event.sequence_id))
    }

    async fn stream_ids(&self) -> Result<Vec<Uuid>, EventRepositoryError> {
        Ok(self.streams.lock().unwrap().keys().copied().collect())
    }
}

/// An event repository that simulates a rival writer racing for sequence
/// ids. Each insert consumes one entry of a rigged plan: a conflict entry
/// stores a rival event in the contested slot and reports the conflict, as
/// if the rival committed first. Inserts beyond the plan pass through.
#[derive(Debug, Default)]
pub struct RacingEventRepository {
    inner: InMemoryEventRepository,
    plan: Mutex<VecDeque<bool>>,
}

impl RacingEventRepository {
    /// Creates a repository with an empty plan; every insert passes through
    /// until a conflict is rigged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `count` inserts pass through uncontested.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pass_next(&self, count: usize) {
        let mut plan = self.plan.lock().unwrap();
        plan.extend(std::iter::repeat_n(false, count));
    }

    /// Makes the rival win the next `count` contested inserts.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn conflict_next(&self, count: usize) {
        let mut plan = self.plan.lock().unwrap();
        plan.extend(std::iter::repeat_n(true, count));
    }
}

#[async_trait]
impl EventRepository for RacingEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), EventRepositoryError> {
        let rival_wins = self.plan.lock().unwrap().pop_front().unwrap_or(false);
        if rival_wins {
            let rival = event_at(event.stream_id, event.sequence_id, "rival.claimed");
            self.inner.insert(&rival).await?;
            return Err(EventRepositoryError::SequenceConflict {
                stream_id: event.stream_id,
                sequence_id: event.sequence_id,
            });
        }
        self.inner.insert(event).await
    }

    async fn stream_events(&self, stream_id: Uuid) -> Result<Vec<Event>, EventRepositoryError> {
        self.inner.stream_events(stream_id).await
    }

    async fn stream_events_from(
        &self,
        stream_id: Uuid,
        from: i64,
    ) -> Result<Vec<Event>, EventRepositoryError> {
        self.inner.stream_events_from(stream_id, from).await
    }

    async fn current_sequence_id(&self, stream_id: Uuid) -> Result<i64, EventRepositoryError> {
        self.inner.current_sequence_id(stream_id).await
    }

    async fn stream_ids(&self) -> Result<Vec<Uuid>, EventRepositoryError> {
        self.inner.stream_ids().await
    }
}

/// An event repository that always returns a storage error. Useful for
/// testing error-propagation paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn insert(&self, _event: &Event) -> Result<(), EventRepositoryError> {
        Err(EventRepositoryError::Storage("connection refused".into()))
    }

    async fn stream_events(&self, _stream_id: Uuid) -> Result<Vec<Event>, EventRepositoryError> {
        Err(EventRepositoryError::Storage("connection refused".into()))
    }

    async fn stream_events_from(
        &self,
        _stream_id: Uuid,
        _from: i64,
    ) -> Result<Vec<Event>, EventRepositoryError> {
        Err(EventRepositoryError::Storage("connection refused".into()))
    }

    async fn current_sequence_id(&self, _stream_id: Uuid) -> Result<i64, EventRepositoryError> {
        Err(EventRepositoryError::Storage("connection refused".into()))
    }

    async fn stream_ids(&self) -> Result<Vec<Uuid>, EventRepositoryError> {
        Err(EventRepositoryError::Storage("connection refused".into()))
    }
}

/// A snapshot repository holding snapshots in memory, with accessors for
/// asserting on what was stored.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: Mutex<Vec<AggregateSnapshot>>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a snapshot directly into the store, bypassing the service.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed(&self, snapshot: AggregateSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }

    /// Number of snapshots stored so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    /// All stored snapshots, in storage order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn snapshots(&self) -> Vec<AggregateSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn latest_snapshot(
        &self,
        stream_id: Uuid,
        type_name: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.stream_id == stream_id && s.type_name == type_name)
            .max_by_key(|s| s.version_id)
            .cloned())
    }

    async fn store_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), SnapshotError> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// A snapshot repository that always returns a storage error. Useful for
/// verifying that snapshot failures never escape the append path.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn latest_snapshot(
        &self,
        _stream_id: Uuid,
        _type_name: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError> {
        Err(SnapshotError::Storage("connection refused".into()))
    }

    async fn store_snapshot(&self, _snapshot: &AggregateSnapshot) -> Result<(), SnapshotError> {
        Err(SnapshotError::Storage("connection refused".into()))
    }
}
