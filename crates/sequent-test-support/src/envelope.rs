//! Envelope and stored-event builders for tests.

use chrono::Utc;
use sequent_core::event::{Envelope, Event, EventMetadata};
use uuid::Uuid;

/// Envelope with a fresh identity and no version, ready to append.
#[must_use]
pub fn envelope(name: &str) -> Envelope {
    Envelope::new(name, serde_json::json!({}))
}

/// Envelope pre-stamped with a version, for malformed-append scenarios.
#[must_use]
pub fn versioned_envelope(name: &str, version: i64) -> Envelope {
    let mut envelope = Envelope::new(name, serde_json::json!({}));
    envelope.metadata.version = Some(version);
    envelope
}

/// Stored event occupying `(stream_id, sequence_id)`, as a rival writer
/// would leave it.
#[must_use]
pub fn event_at(stream_id: Uuid, sequence_id: i64, name: &str) -> Event {
    let event_id = Uuid::now_v7();
    Event {
        id: event_id,
        stream_id,
        sequence_id,
        name: name.to_owned(),
        metadata: EventMetadata {
            event_id,
            name: name.to_owned(),
            correlation_id: None,
            causation: Vec::new(),
            version: Some(sequence_id),
        },
        payload: serde_json::json!({}),
        occurred_at: Utc::now(),
    }
}
