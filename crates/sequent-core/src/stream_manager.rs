//! Append and read protocol for event streams.
//!
//! All mutation of a stream goes through [`EventStreamManager`]. Sequence ids
//! are assigned here, one past the current version; the storage layer's
//! uniqueness constraint on `(stream_id, sequence_id)` is what serializes
//! concurrent appenders, not any in-process lock.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EventSourceConfig;
use crate::error::{EventRepositoryError, EventStreamError};
use crate::event::{Envelope, Event};
use crate::repository::EventRepository;

/// Mediates every append and read against the event repository.
pub struct EventStreamManager {
    repository: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
    max_append_retries: u32,
}

impl EventStreamManager {
    /// Creates a manager over `repository` with the retry ceiling taken from
    /// `config`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn EventRepository>,
        clock: Arc<dyn Clock>,
        config: &EventSourceConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            max_append_retries: config.max_append_retries,
        }
    }

    /// All events of the stream in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`EventStreamError::Repository`] when the read fails.
    pub async fn read(&self, stream_id: Uuid) -> Result<Vec<Event>, EventStreamError> {
        Ok(self.repository.stream_events(stream_id).await?)
    }

    /// Events with `sequence_id >= version`, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`EventStreamError::Repository`] when the read fails.
    pub async fn read_from(
        &self,
        stream_id: Uuid,
        version: i64,
    ) -> Result<Vec<Event>, EventStreamError> {
        Ok(self.repository.stream_events_from(stream_id, version).await?)
    }

    /// Highest sequence id of the stream, 0 when the stream is empty.
    ///
    /// # Errors
    ///
    /// Returns [`EventStreamError::Repository`] when the read fails.
    pub async fn current_version(&self, stream_id: Uuid) -> Result<i64, EventStreamError> {
        Ok(self.repository.current_sequence_id(stream_id).await?)
    }

    /// Distinct ids of every stream in the log.
    ///
    /// # Errors
    ///
    /// Returns [`EventStreamError::Repository`] when the read fails.
    pub async fn stream_ids(&self) -> Result<Vec<Uuid>, EventStreamError> {
        Ok(self.repository.stream_ids().await?)
    }

    /// Appends envelopes at the head of the stream, assigning consecutive
    /// sequence ids from the current version, and returns the new version.
    /// An empty batch reads and returns the current version without writing.
    ///
    /// # Errors
    ///
    /// [`EventStreamError::VersionAlreadyAssigned`] if any envelope carries a
    /// version, rejected before anything is written.
    /// [`EventStreamError::OptimisticLock`] if a concurrent writer took a
    /// sequence id this append derived; events inserted before the conflict
    /// stay committed.
    pub async fn append(
        &self,
        stream_id: Uuid,
        envelopes: Vec<Envelope>,
    ) -> Result<i64, EventStreamError> {
        validate_unversioned(stream_id, &envelopes)?;
        let current = self.current_version(stream_id).await?;
        self.insert_from(stream_id, current, envelopes).await
    }

    /// As [`append`](Self::append), but only if the stream is still at
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// [`EventStreamError::VersionMismatch`] when `expected_version` lies
    /// beyond the head of the stream, a caller logic error.
    /// [`EventStreamError::OptimisticLock`] when the stream already moved
    /// past `expected_version`; the caller may re-read and retry.
    /// [`EventStreamError::VersionAlreadyAssigned`] as for `append`.
    pub async fn append_after(
        &self,
        stream_id: Uuid,
        envelopes: Vec<Envelope>,
        expected_version: i64,
    ) -> Result<i64, EventStreamError> {
        validate_unversioned(stream_id, &envelopes)?;
        let current = self.current_version(stream_id).await?;
        if expected_version > current {
            return Err(EventStreamError::VersionMismatch {
                stream_id,
                expected: expected_version,
                actual: current,
            });
        }
        if expected_version < current {
            return Err(EventStreamError::OptimisticLock {
                stream_id,
                version: expected_version,
                current,
            });
        }
        self.insert_from(stream_id, current, envelopes).await
    }

    /// Appends envelopes without requiring them to extend a version the
    /// caller observed. Each envelope is retried on optimistic-lock conflicts
    /// up to the configured ceiling, re-reading the current version before
    /// every retry and re-deriving the sequence id.
    ///
    /// # Errors
    ///
    /// [`EventStreamError::OptimisticLock`] once the retry ceiling is
    /// exhausted; envelopes inserted before that stay committed.
    /// [`EventStreamError::VersionAlreadyAssigned`] as for `append`.
    pub async fn append_non_consecutively(
        &self,
        stream_id: Uuid,
        envelopes: Vec<Envelope>,
    ) -> Result<i64, EventStreamError> {
        validate_unversioned(stream_id, &envelopes)?;
        let mut version = self.current_version(stream_id).await?;
        for envelope in envelopes {
            version = self.insert_with_retry(stream_id, version, envelope).await?;
        }
        Ok(version)
    }

    async fn insert_from(
        &self,
        stream_id: Uuid,
        mut version: i64,
        envelopes: Vec<Envelope>,
    ) -> Result<i64, EventStreamError> {
        for envelope in envelopes {
            version += 1;
            let event = Event::admit(envelope, stream_id, version, self.clock.now());
            match self.repository.insert(&event).await {
                Ok(()) => {}
                Err(EventRepositoryError::SequenceConflict { .. }) => {
                    return Err(self.lock_conflict(stream_id, version).await);
                }
                Err(error) => return Err(error.into()),
            }
        }
        debug!(stream_id = %stream_id, new_version = version, "appended events");
        Ok(version)
    }

    async fn insert_with_retry(
        &self,
        stream_id: Uuid,
        mut version: i64,
        envelope: Envelope,
    ) -> Result<i64, EventStreamError> {
        let mut retries: u32 = 0;
        loop {
            version += 1;
            let event = Event::admit(envelope.clone(), stream_id, version, self.clock.now());
            match self.repository.insert(&event).await {
                Ok(()) => return Ok(version),
                Err(EventRepositoryError::SequenceConflict { .. }) => {
                    retries += 1;
                    if retries > self.max_append_retries {
                        warn!(
                            stream_id = %stream_id,
                            retries = self.max_append_retries,
                            "append retries exhausted by concurrent writers, surfacing the conflict"
                        );
                        return Err(self.lock_conflict(stream_id, version).await);
                    }
                    debug!(
                        stream_id = %stream_id,
                        contested_version = version,
                        retries,
                        "sequence id contested, re-deriving from current version"
                    );
                    version = self.current_version(stream_id).await?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Conflict error for a contested `version`. The current version is
    /// re-read purely for the error message; if that read fails too, the
    /// contested version stands in.
    async fn lock_conflict(&self, stream_id: Uuid, version: i64) -> EventStreamError {
        let current = self
            .repository
            .current_sequence_id(stream_id)
            .await
            .unwrap_or(version);
        EventStreamError::OptimisticLock {
            stream_id,
            version,
            current,
        }
    }
}

fn validate_unversioned(stream_id: Uuid, envelopes: &[Envelope]) -> Result<(), EventStreamError> {
    if envelopes.iter().any(|e| e.metadata.version.is_some()) {
        return Err(EventStreamError::VersionAlreadyAssigned { stream_id });
    }
    Ok(())
}
