//! Page monitoring.
//!
//! This module contains the check pipeline and its parts:
//! - [`source`]: fetching page text with endpoint and timeout fallback
//! - [`classifier`]: turning page text into order/availability signals
//! - [`tracker`]: diffing an observation against the previous snapshot
//! - [`governor`]: consecutive-failure cooldown
//! - [`events`]: change events and their fanout
//! - [`service`]: the [`PageMonitor`] tying it together under one check lock

pub mod classifier;
pub mod clock;
pub mod events;
pub mod governor;
pub mod service;
pub mod source;
pub mod state;
pub mod tracker;

pub use classifier::{ClassificationReport, Classifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{ChangeEvent, ChangeKind, Notifier};
pub use governor::{FailureGovernor, GovernorState};
pub use service::{
    CheckOutcome, CheckReport, CheckSettings, CheckTrigger, FailedCheck, LastKnown, PageMonitor,
};
pub use source::{
    ContentSource, FetchFailure, FetchedContent, FileContentSource, HttpContentSource,
    fetch_with_fallback, source_from_config,
};
pub use state::{GovernorStatus, MonitorState, StatusSnapshot};
pub use tracker::{Observation, StateTracker, Transition};
