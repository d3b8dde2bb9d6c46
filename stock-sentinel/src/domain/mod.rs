//! Domain types shared by the monitor, the snapshot store and the API.

pub mod classification;
pub mod snapshot;

pub use classification::Classification;
pub use snapshot::{NewSnapshot, Snapshot, fingerprint};
