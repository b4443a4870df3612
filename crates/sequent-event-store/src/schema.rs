//! Event store database schema.

/// SQL to create the event log table.
pub const CREATE_EVENT_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS event_log (
    id           UUID PRIMARY KEY,
    stream_id    UUID NOT NULL,
    sequence_id  BIGINT NOT NULL,
    name         VARCHAR(255) NOT NULL,
    metadata     JSONB NOT NULL,
    payload      JSONB NOT NULL,
    date_created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (stream_id, sequence_id)
);

CREATE INDEX IF NOT EXISTS idx_event_log_stream_id
    ON event_log (stream_id, sequence_id);
";

/// SQL to create the snapshot table. Snapshots are never mutated; historical
/// rows for the same stream and type coexist.
pub const CREATE_AGGREGATE_SNAPSHOT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aggregate_snapshot (
    stream_id  UUID NOT NULL,
    type       VARCHAR(255) NOT NULL,
    version_id BIGINT NOT NULL,
    aggregate  JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_aggregate_snapshot_latest
    ON aggregate_snapshot (stream_id, type, version_id DESC);
";
