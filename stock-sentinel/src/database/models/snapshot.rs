//! Snapshot database model.

use sqlx::FromRow;

use crate::database::time::ms_to_datetime;
use crate::domain::{Classification, Snapshot};

/// Row of the `page_snapshots` table.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotDbModel {
    pub id: i64,
    /// Unix epoch milliseconds (UTC).
    pub captured_at: i64,
    pub content_hash: String,
    pub content_length: i64,
    pub has_order_button: bool,
    pub has_availability: bool,
    pub raw_content: Option<String>,
    pub source_endpoint: Option<String>,
}

impl From<SnapshotDbModel> for Snapshot {
    fn from(model: SnapshotDbModel) -> Self {
        Snapshot {
            id: model.id,
            timestamp: ms_to_datetime(model.captured_at),
            content_fingerprint: model.content_hash,
            content_length: model.content_length,
            classification: Classification::new(model.has_order_button, model.has_availability),
            source_endpoint: model.source_endpoint,
            raw_content: model.raw_content,
        }
    }
}
