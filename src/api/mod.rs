//! Purpose: Define the public Rust API boundary for trackmux.
//! Exports: Tracker, identifiers, storage plumbing, and error types.
//! Role: Additive-only surface for importers and the CLI.
//! Invariants: Callers never need to reach into `core` for normal use.

pub use crate::core::anomaly::{Anomaly, AnomalyPolicy, AnomalyStats};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::ids::{StringId, TrackId, TrackSetId, UniquePid};
pub use crate::core::state::{
    NestingBehaviour, ProcessKey, SliceSlot, TrackSet, TrackSetKey, TrackSetKind, TrackState,
};
pub use crate::core::storage::{TrackDescriptor, TrackStore, TrackTable};
pub use crate::core::strings::StringPool;
pub use crate::core::tracker::{AsyncTrackSetTracker, TrackerOptions};
