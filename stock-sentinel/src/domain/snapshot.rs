//! Snapshot: one fetch attempt's recorded outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Classification;

/// A persisted snapshot. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub content_fingerprint: String,
    pub content_length: i64,
    pub classification: Classification,
    /// Endpoint that served the content, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

/// A snapshot that has not been written yet; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub timestamp: DateTime<Utc>,
    pub content_fingerprint: String,
    pub content_length: i64,
    pub classification: Classification,
    pub source_endpoint: Option<String>,
    pub raw_content: Option<String>,
}

impl NewSnapshot {
    /// Build a snapshot from fetched text, computing fingerprint and length.
    pub fn from_content(
        content: &str,
        classification: Classification,
        timestamp: DateTime<Utc>,
        retain_raw_content: bool,
    ) -> Self {
        Self {
            timestamp,
            content_fingerprint: fingerprint(content),
            content_length: content.len() as i64,
            classification,
            source_endpoint: None,
            raw_content: retain_raw_content.then(|| content.to_string()),
        }
    }

    pub fn with_source_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.source_endpoint = Some(endpoint.into());
        self
    }

    /// Attach the id and effective timestamp assigned at persistence time.
    pub fn into_snapshot(self, id: i64, timestamp: DateTime<Utc>) -> Snapshot {
        Snapshot {
            id,
            timestamp,
            content_fingerprint: self.content_fingerprint,
            content_length: self.content_length,
            classification: self.classification,
            source_endpoint: self.source_endpoint,
            raw_content: self.raw_content,
        }
    }
}

/// SHA-256 digest of the raw content, hex encoded.
pub fn fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
