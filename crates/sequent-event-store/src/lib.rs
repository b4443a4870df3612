//! Sequent Event Store — `PostgreSQL` implementations of the repository
//! traits from `sequent-core`.
//!
//! The `UNIQUE (stream_id, sequence_id)` constraint on the event log is the
//! serialization point the append protocol relies on; inserts racing for the
//! same slot surface as sequence conflicts here.

pub mod pg_event_repository;
pub mod pg_snapshot_repository;
pub mod schema;
