//! Purpose: Data model for track sets and the physical tracks they own.
//! Exports: `TrackSetKind`, `TrackSetKey`, `ProcessKey`, `NestingBehaviour`, `SliceSlot`,
//! `TrackState`, `TrackSet`.
//! Role: Plain state consumed by `tracker`; holds no allocation policy of its own.
//! Invariants: A set's kind is derived from its key and never changes.
//! Invariants: `TrackSet::tracks` is append-only; indices are stable once assigned.
use serde::Serialize;

use crate::core::ids::{StringId, TrackId, UniquePid};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSetKind {
    /// Grouped by name only.
    Global,
    /// Per-process async slices grouped by (upid, name).
    ProcessScoped,
    /// Expected/actual frame timeline tracks grouped by (upid, name).
    TimelinePair,
}

impl TrackSetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackSetKind::Global => "global",
            TrackSetKind::ProcessScoped => "process_scoped",
            TrackSetKind::TimelinePair => "timeline_pair",
        }
    }

    pub fn default_nesting(self) -> NestingBehaviour {
        match self {
            TrackSetKind::Global | TrackSetKind::TimelinePair => NestingBehaviour::Unnestable,
            TrackSetKind::ProcessScoped => NestingBehaviour::LegacySaturatingUnnestable,
        }
    }

    /// Whether fully-bounded intervals may be placed on sets of this kind.
    pub fn supports_scoped(self) -> bool {
        match self {
            TrackSetKind::Global | TrackSetKind::TimelinePair => true,
            TrackSetKind::ProcessScoped => false,
        }
    }
}

/// Tuple key compared by upid first, then name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProcessKey {
    pub upid: UniquePid,
    pub name: StringId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackSetKey {
    Global { name: StringId },
    ProcessScoped(ProcessKey),
    TimelinePair(ProcessKey),
}

impl TrackSetKey {
    pub fn kind(&self) -> TrackSetKind {
        match self {
            TrackSetKey::Global { .. } => TrackSetKind::Global,
            TrackSetKey::ProcessScoped(_) => TrackSetKind::ProcessScoped,
            TrackSetKey::TimelinePair(_) => TrackSetKind::TimelinePair,
        }
    }

    pub fn name(&self) -> StringId {
        match self {
            TrackSetKey::Global { name } => *name,
            TrackSetKey::ProcessScoped(key) | TrackSetKey::TimelinePair(key) => key.name,
        }
    }

    pub fn upid(&self) -> Option<UniquePid> {
        match self {
            TrackSetKey::Global { .. } => None,
            TrackSetKey::ProcessScoped(key) | TrackSetKey::TimelinePair(key) => Some(key.upid),
        }
    }
}

/// How repeated begins with one cookie are treated.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingBehaviour {
    /// Begin -> Begin with one cookie and no End in between is a protocol anomaly.
    Unnestable,
    /// Begin -> Begin with one cookie collapses onto the open slice and bumps a
    /// counter; the same number of Ends closes it. Legacy systrace async
    /// markers behave this way.
    LegacySaturatingUnnestable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SliceSlot {
    /// Open slice identified by a caller cookie; free once `nest_count` is zero.
    Cookie { cookie: i64, nest_count: u32 },
    /// Bounded slice identified by its end; free for any start at or after `ts_end`.
    Timestamp { ts_end: i64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TrackState {
    pub id: TrackId,
    pub slot: SliceSlot,
}

impl TrackState {
    pub fn holds_cookie(&self, wanted: i64) -> bool {
        matches!(self.slot, SliceSlot::Cookie { cookie, .. } if cookie == wanted)
    }

    pub fn is_free_cookie_track(&self) -> bool {
        matches!(self.slot, SliceSlot::Cookie { nest_count: 0, .. })
    }

    pub fn is_free_at(&self, ts: i64) -> bool {
        matches!(self.slot, SliceSlot::Timestamp { ts_end } if ts_end <= ts)
    }

    pub fn nest_count(&self) -> Option<u32> {
        match self.slot {
            SliceSlot::Cookie { nest_count, .. } => Some(nest_count),
            SliceSlot::Timestamp { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrackSet {
    key: TrackSetKey,
    nesting: NestingBehaviour,
    pub(crate) tracks: Vec<TrackState>,
}

impl TrackSet {
    pub(crate) fn new(key: TrackSetKey, nesting: NestingBehaviour) -> Self {
        Self {
            key,
            nesting,
            tracks: Vec::new(),
        }
    }

    pub fn key(&self) -> TrackSetKey {
        self.key
    }

    pub fn kind(&self) -> TrackSetKind {
        self.key.kind()
    }

    pub fn nesting(&self) -> NestingBehaviour {
        self.nesting
    }

    pub fn tracks(&self) -> &[TrackState] {
        &self.tracks
    }

    pub fn open_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|track| track.nest_count().is_some_and(|count| count > 0))
            .count()
    }
}
