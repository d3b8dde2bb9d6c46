//! Database models.

pub mod snapshot;

pub use snapshot::SnapshotDbModel;
