//! Sequent Core — event stream, snapshot, and replay engine.
//!
//! This crate implements the stream append protocol with optimistic
//! concurrency, periodic aggregate snapshotting, and snapshot-aware
//! rehydration. It contains no infrastructure code; storage sits behind
//! the repository traits.

pub mod aggregate;
pub mod aggregate_service;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod event_source;
pub mod repository;
pub mod snapshot;
pub mod snapshot_aware_stream;
pub mod snapshot_service;
pub mod stream;
pub mod stream_manager;
