//! Repository layer for database access.

pub mod snapshot;

pub use snapshot::*;
