//! Event and envelope types.
//!
//! An [`Envelope`] is an event that has not yet been admitted to a stream:
//! it carries a payload and metadata but no sequence id. The stream manager
//! turns envelopes into immutable [`Event`] records by assigning the next
//! sequence id at insert time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Logical event name, used for handler routing.
    pub name: String,
    /// Correlation id threading one client interaction through its effects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Ids of the events that caused this one, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causation: Vec<Uuid>,
    /// Position in the stream. `None` until the stream manager assigns it;
    /// appends reject envelopes that already carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// An event that has not yet been admitted to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Metadata for the pending event. `metadata.version` must be empty.
    pub metadata: EventMetadata,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Fresh envelope carrying `payload` under `name`, with a new identity
    /// and no causation history.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            metadata: EventMetadata {
                event_id: Uuid::now_v7(),
                name: name.into(),
                correlation_id: None,
                causation: Vec::new(),
                version: None,
            },
            payload,
        }
    }

    /// Envelope caused by a stored event: fresh identity, the parent's
    /// correlation id, and the parent appended to the causation chain.
    #[must_use]
    pub fn caused_by(parent: &Event, name: impl Into<String>, payload: serde_json::Value) -> Self {
        let mut causation = parent.metadata.causation.clone();
        causation.push(parent.id);
        Self {
            metadata: EventMetadata {
                event_id: Uuid::now_v7(),
                name: name.into(),
                correlation_id: parent.metadata.correlation_id,
                causation,
                version: None,
            },
            payload,
        }
    }

    /// Attaches a correlation id to the pending event.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.metadata.correlation_id = Some(correlation_id);
        self
    }
}

/// Immutable record of an event admitted to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Stream this event belongs to.
    pub stream_id: Uuid,
    /// 1-based position within the stream. Contiguous per stream.
    pub sequence_id: i64,
    /// Logical event name.
    pub name: String,
    /// Metadata as stored, with `version` stamped to `sequence_id`.
    pub metadata: EventMetadata,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
    /// Timestamp of admission to the stream.
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Turns an envelope into a stored event at `sequence_id`, stamping the
    /// assigned version into the metadata.
    pub(crate) fn admit(
        envelope: Envelope,
        stream_id: Uuid,
        sequence_id: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let mut metadata = envelope.metadata;
        metadata.version = Some(sequence_id);
        Self {
            id: metadata.event_id,
            stream_id,
            sequence_id,
            name: metadata.name.clone(),
            metadata,
            payload: envelope.payload,
            occurred_at,
        }
    }
}
