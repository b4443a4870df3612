//! Shared test mocks and utilities for the Sequent event store.

mod aggregate;
mod clock;
mod envelope;
mod logging;
mod repository;

pub use aggregate::RecordingAggregate;
pub use clock::FixedClock;
pub use envelope::{envelope, event_at, versioned_envelope};
pub use logging::init_tracing;
pub use repository::{
    FailingEventRepository, FailingSnapshotRepository, InMemoryEventRepository,
    InMemorySnapshotRepository, RacingEventRepository,
};
