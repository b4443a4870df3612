//! Aggregate rehydration from snapshots and event replay.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::aggregate::Aggregate;
use crate::error::RehydrationError;
use crate::snapshot::AggregateSnapshot;
use crate::snapshot_service::SnapshotService;
use crate::stream::EventStream;

/// Rebuilds aggregates by replaying a stream on top of its latest snapshot.
pub struct AggregateService {
    snapshot_service: Arc<SnapshotService>,
}

impl AggregateService {
    /// Service resolving snapshots through `snapshot_service`.
    #[must_use]
    pub fn new(snapshot_service: Arc<SnapshotService>) -> Self {
        Self { snapshot_service }
    }

    /// Produces an `A` whose state equals folding every event of `stream` up
    /// to its current version.
    ///
    /// Starts from the latest snapshot matching `A`'s type name when one
    /// exists and decodes, replaying only events past it; otherwise replays
    /// from the first event. Snapshot problems of any kind downgrade to a
    /// full replay, never to a failure: the snapshot is an optimization, the
    /// event log is the source of truth.
    ///
    /// # Errors
    ///
    /// Returns [`RehydrationError`] when the stream cannot be read or the
    /// aggregate rejects an event during replay.
    pub async fn rehydrate<A>(&self, stream: &dyn EventStream) -> Result<A, RehydrationError>
    where
        A: Aggregate + Default + DeserializeOwned,
    {
        let mut aggregate = A::default();
        let type_name = aggregate.type_name().to_owned();

        let mut replay_from = 0;
        if let Some((restored, version_id)) = self.restore::<A>(stream, &type_name).await {
            aggregate = restored;
            replay_from = version_id;
        }

        let events = if replay_from > 0 {
            stream.read_from(replay_from + 1).await?
        } else {
            stream.read().await?
        };
        for event in &events {
            aggregate.apply_event(event)?;
        }
        debug!(
            stream_id = %stream.id(),
            type_name,
            snapshot_version = replay_from,
            replayed = events.len(),
            "rehydrated aggregate"
        );
        Ok(aggregate)
    }

    /// Latest decodable snapshot state for `type_name`, or `None` when the
    /// stream has no usable snapshot.
    async fn restore<A>(&self, stream: &dyn EventStream, type_name: &str) -> Option<(A, i64)>
    where
        A: DeserializeOwned,
    {
        let snapshot = match self
            .snapshot_service
            .latest_snapshot(stream.id(), type_name)
            .await
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(error) => {
                warn!(
                    stream_id = %stream.id(),
                    type_name,
                    %error,
                    "snapshot lookup failed, replaying from the first event"
                );
                return None;
            }
        };

        let AggregateSnapshot {
            version_id, state, ..
        } = snapshot;
        match serde_json::from_value::<A>(state) {
            Ok(aggregate) => Some((aggregate, version_id)),
            Err(error) => {
                warn!(
                    stream_id = %stream.id(),
                    type_name,
                    version_id,
                    %error,
                    "snapshot state did not decode, replaying from the first event"
                );
                None
            }
        }
    }
}
