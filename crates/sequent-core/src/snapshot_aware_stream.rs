//! Snapshot-aware decoration of the stream facade.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::error::EventStreamError;
use crate::event::{Envelope, Event};
use crate::snapshot_service::SnapshotService;
use crate::stream::{EnvelopeEventStream, EventStream, Tolerance};

/// Stream facade that offers registered aggregates to the snapshot service
/// after each successful consecutive append.
///
/// Non-consecutive appends never trigger snapshot attempts: state folded
/// from them is not a valid replay checkpoint.
pub struct SnapshotAwareEventStream {
    inner: EnvelopeEventStream,
    snapshot_service: Arc<SnapshotService>,
    aggregates: Mutex<HashMap<String, Arc<Mutex<dyn Aggregate>>>>,
}

impl SnapshotAwareEventStream {
    /// Decorates `inner` with snapshot attempts through `snapshot_service`.
    #[must_use]
    pub fn new(inner: EnvelopeEventStream, snapshot_service: Arc<SnapshotService>) -> Self {
        Self {
            inner,
            snapshot_service,
            aggregates: Mutex::new(HashMap::new()),
        }
    }

    /// Declares an aggregate to snapshot after appends on this stream
    /// instance. A second registration under the same type name replaces the
    /// first.
    pub async fn register_aggregate(&self, aggregate: Arc<Mutex<dyn Aggregate>>) {
        let type_name = aggregate.lock().await.type_name().to_owned();
        self.aggregates.lock().await.insert(type_name, aggregate);
    }

    async fn offer_snapshots(&self, new_version: i64) {
        let aggregates: Vec<Arc<Mutex<dyn Aggregate>>> =
            self.aggregates.lock().await.values().cloned().collect();
        for aggregate in aggregates {
            let guard = aggregate.lock().await;
            self.snapshot_service
                .attempt_aggregate_store(self.inner.id(), new_version, &*guard)
                .await;
        }
    }
}

#[async_trait]
impl EventStream for SnapshotAwareEventStream {
    fn id(&self) -> Uuid {
        self.inner.id()
    }

    async fn read(&self) -> Result<Vec<Event>, EventStreamError> {
        self.inner.read().await
    }

    async fn read_from(&self, version: i64) -> Result<Vec<Event>, EventStreamError> {
        self.inner.read_from(version).await
    }

    async fn current_version(&self) -> Result<i64, EventStreamError> {
        self.inner.current_version().await
    }

    async fn append(&self, envelopes: Vec<Envelope>) -> Result<i64, EventStreamError> {
        let version = self.inner.append(envelopes).await?;
        self.offer_snapshots(version).await;
        Ok(version)
    }

    async fn append_after(
        &self,
        envelopes: Vec<Envelope>,
        expected_version: i64,
    ) -> Result<i64, EventStreamError> {
        let version = self.inner.append_after(envelopes, expected_version).await?;
        self.offer_snapshots(version).await;
        Ok(version)
    }

    async fn append_with_tolerance(
        &self,
        envelopes: Vec<Envelope>,
        tolerance: Tolerance,
    ) -> Result<i64, EventStreamError> {
        match tolerance {
            Tolerance::Consecutive => self.append(envelopes).await,
            Tolerance::NonConsecutive => {
                self.inner
                    .append_with_tolerance(envelopes, Tolerance::NonConsecutive)
                    .await
            }
        }
    }
}
