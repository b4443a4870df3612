//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use sequent_core::error::EventRepositoryError;
use sequent_core::event::{Event, EventMetadata};
use sequent_core::repository::EventRepository;

const SQL_INSERT: &str = "
    INSERT INTO event_log (id, stream_id, sequence_id, name, metadata, payload, date_created)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
";
const SQL_FIND_BY_STREAM_ID: &str =
    "SELECT * FROM event_log WHERE stream_id = $1 ORDER BY sequence_id ASC";
const SQL_FIND_BY_STREAM_ID_AND_SEQUENCE_ID: &str =
    "SELECT * FROM event_log WHERE stream_id = $1 AND sequence_id >= $2 ORDER BY sequence_id ASC";
const SQL_FIND_LATEST_SEQUENCE_ID: &str =
    "SELECT COALESCE(MAX(sequence_id), 0) FROM event_log WHERE stream_id = $1";
const SQL_DISTINCT_STREAM_ID: &str = "SELECT DISTINCT stream_id FROM event_log";

/// `PostgreSQL`-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), EventRepositoryError> {
        let metadata = serde_json::to_value(&event.metadata).map_err(|error| {
            EventRepositoryError::Storage(format!("unserializable event metadata: {error}"))
        })?;

        let result = sqlx::query(SQL_INSERT)
            .bind(event.id)
            .bind(event.stream_id)
            .bind(event.sequence_id)
            .bind(&event.name)
            .bind(&metadata)
            .bind(&event.payload)
            .bind(event.occurred_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            // The unique constraint on (stream_id, sequence_id) caught a
            // rival writer; the stream manager decides whether to retry.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(EventRepositoryError::SequenceConflict {
                    stream_id: event.stream_id,
                    sequence_id: event.sequence_id,
                })
            }
            Err(error) => {
                error!(
                    stream_id = %event.stream_id,
                    sequence_id = event.sequence_id,
                    %error,
                    "error persisting event to the database"
                );
                Err(storage(error))
            }
        }
    }

    async fn stream_events(&self, stream_id: Uuid) -> Result<Vec<Event>, EventRepositoryError> {
        let rows = sqlx::query(SQL_FIND_BY_STREAM_ID)
            .bind(stream_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn stream_events_from(
        &self,
        stream_id: Uuid,
        from: i64,
    ) -> Result<Vec<Event>, EventRepositoryError> {
        let rows = sqlx::query(SQL_FIND_BY_STREAM_ID_AND_SEQUENCE_ID)
            .bind(stream_id)
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn current_sequence_id(&self, stream_id: Uuid) -> Result<i64, EventRepositoryError> {
        sqlx::query_scalar(SQL_FIND_LATEST_SEQUENCE_ID)
            .bind(stream_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn stream_ids(&self) -> Result<Vec<Uuid>, EventRepositoryError> {
        sqlx::query_scalar(SQL_DISTINCT_STREAM_ID)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)
    }
}

fn storage(error: sqlx::Error) -> EventRepositoryError {
    EventRepositoryError::Storage(error.to_string())
}

fn event_from_row(row: &PgRow) -> Result<Event, EventRepositoryError> {
    let metadata: serde_json::Value = row.try_get("metadata").map_err(storage)?;
    let metadata: EventMetadata = serde_json::from_value(metadata).map_err(|error| {
        EventRepositoryError::Storage(format!("undecodable event metadata: {error}"))
    })?;
    Ok(Event {
        id: row.try_get("id").map_err(storage)?,
        stream_id: row.try_get("stream_id").map_err(storage)?,
        sequence_id: row.try_get("sequence_id").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        metadata,
        payload: row.try_get("payload").map_err(storage)?,
        occurred_at: row
            .try_get::<DateTime<Utc>, _>("date_created")
            .map_err(storage)?,
    })
}
