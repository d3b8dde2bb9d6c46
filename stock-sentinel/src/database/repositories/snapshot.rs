//! Snapshot repository: the append-only history of fetch outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::SnapshotDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::domain::{NewSnapshot, Snapshot};
use crate::Result;

/// Upper bound on rows returned by a single history query.
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// Columns selected for history queries (raw content excluded).
const SUMMARY_COLUMNS: &str = "id, captured_at, content_hash, content_length, has_order_button, \
     has_availability, NULL AS raw_content, source_endpoint";

/// Snapshot repository trait.
///
/// Rows are never updated. The only delete path is [`SnapshotRepository::prune_older_than`],
/// which is a maintenance operation and is not used by the check pipeline.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist a snapshot and return it with its assigned id and effective timestamp.
    ///
    /// The stored timestamp is never older than the newest existing row.
    async fn append(&self, snapshot: NewSnapshot) -> Result<Snapshot>;

    /// Most recent `limit` snapshots, newest first, without raw content.
    async fn latest(&self, limit: i64) -> Result<Vec<Snapshot>>;

    /// Newest snapshot captured at or before `now`, read from storage.
    async fn most_recent_before(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>>;

    /// Fetch a single snapshot including its raw content.
    async fn find(&self, id: i64) -> Result<Option<Snapshot>>;

    /// Number of stored snapshots.
    async fn count(&self) -> Result<i64>;

    /// Delete snapshots captured before `cutoff`. Returns the number of rows removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx implementation of SnapshotRepository.
pub struct SqlxSnapshotRepository {
    pool: SqlitePool,
}

impl SqlxSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_once(&self, snapshot: &NewSnapshot) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            INSERT INTO page_snapshots (
                captured_at, content_hash, content_length,
                has_order_button, has_availability, raw_content, source_endpoint
            ) VALUES (
                MAX(?, COALESCE((SELECT MAX(captured_at) FROM page_snapshots), 0)),
                ?, ?, ?, ?, ?, ?
            )
            RETURNING id, captured_at
            "#,
        )
        .bind(datetime_to_ms(snapshot.timestamp))
        .bind(&snapshot.content_fingerprint)
        .bind(snapshot.content_length)
        .bind(snapshot.classification.has_order_signal)
        .bind(snapshot.classification.has_availability_signal)
        .bind(&snapshot.raw_content)
        .bind(&snapshot.source_endpoint)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SnapshotRepository for SqlxSnapshotRepository {
    async fn append(&self, snapshot: NewSnapshot) -> Result<Snapshot> {
        let (id, captured_at) =
            retry_on_sqlite_busy("append_snapshot", || self.insert_once(&snapshot)).await?;
        Ok(snapshot.into_snapshot(id, ms_to_datetime(captured_at)))
    }

    async fn latest(&self, limit: i64) -> Result<Vec<Snapshot>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let rows = sqlx::query_as::<_, SnapshotDbModel>(&format!(
            "SELECT {} FROM page_snapshots ORDER BY id DESC LIMIT ?",
            SUMMARY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Snapshot::from).collect())
    }

    async fn most_recent_before(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotDbModel>(&format!(
            "SELECT {} FROM page_snapshots WHERE captured_at <= ? ORDER BY id DESC LIMIT 1",
            SUMMARY_COLUMNS
        ))
        .bind(datetime_to_ms(now))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Snapshot::from))
    }

    async fn find(&self, id: i64) -> Result<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotDbModel>("SELECT * FROM page_snapshots WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Snapshot::from))
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM page_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM page_snapshots WHERE captured_at < ?")
            .bind(datetime_to_ms(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
