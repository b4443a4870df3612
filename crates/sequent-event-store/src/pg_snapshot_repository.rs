//! `PostgreSQL` implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use sequent_core::error::SnapshotError;
use sequent_core::repository::SnapshotRepository;
use sequent_core::snapshot::AggregateSnapshot;

const SQL_FIND_LATEST_BY_STREAM_ID_AND_TYPE: &str = "
    SELECT stream_id, type, version_id, aggregate, created_at
    FROM aggregate_snapshot
    WHERE stream_id = $1 AND type = $2
    ORDER BY version_id DESC
    LIMIT 1
";
const SQL_INSERT: &str = "
    INSERT INTO aggregate_snapshot (stream_id, type, version_id, aggregate, created_at)
    VALUES ($1, $2, $3, $4, $5)
";

/// `PostgreSQL`-backed snapshot repository. Rows are insert-only; superseded
/// snapshots stay behind as history.
#[derive(Debug, Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    /// Creates a new `PgSnapshotRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn latest_snapshot(
        &self,
        stream_id: Uuid,
        type_name: &str,
    ) -> Result<Option<AggregateSnapshot>, SnapshotError> {
        let row = sqlx::query(SQL_FIND_LATEST_BY_STREAM_ID_AND_TYPE)
            .bind(stream_id)
            .bind(type_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    async fn store_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), SnapshotError> {
        sqlx::query(SQL_INSERT)
            .bind(snapshot.stream_id)
            .bind(&snapshot.type_name)
            .bind(snapshot.version_id)
            .bind(&snapshot.state)
            .bind(snapshot.created_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

fn storage(error: sqlx::Error) -> SnapshotError {
    SnapshotError::Storage(error.to_string())
}

fn snapshot_from_row(row: &PgRow) -> Result<AggregateSnapshot, SnapshotError> {
    Ok(AggregateSnapshot {
        stream_id: row.try_get("stream_id").map_err(storage)?,
        type_name: row.try_get("type").map_err(storage)?,
        version_id: row.try_get("version_id").map_err(storage)?,
        state: row.try_get("aggregate").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
    })
}
