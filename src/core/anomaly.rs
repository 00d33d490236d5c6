//! Purpose: Classify and count data-quality anomalies seen while allocating tracks.
//! Exports: `Anomaly`, `AnomalyPolicy`, `AnomalyStats`.
//! Role: Lets strict callers fail fast and production ingestion keep going.
//! Invariants: Recording an anomaly never mutates track state.
use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::ids::TrackSetId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Begin on an unnestable set while the same cookie is still open.
    ReentrantBegin { set: TrackSetId, cookie: i64 },
    /// End for a cookie that has no open slice in the set.
    EndWithoutBegin { set: TrackSetId, cookie: i64 },
}

impl Anomaly {
    pub fn label(&self) -> &'static str {
        match self {
            Anomaly::ReentrantBegin { .. } => "reentrant_begin",
            Anomaly::EndWithoutBegin { .. } => "end_without_begin",
        }
    }

    pub fn set(&self) -> TrackSetId {
        match self {
            Anomaly::ReentrantBegin { set, .. } | Anomaly::EndWithoutBegin { set, .. } => *set,
        }
    }

    pub fn cookie(&self) -> i64 {
        match self {
            Anomaly::ReentrantBegin { cookie, .. } | Anomaly::EndWithoutBegin { cookie, .. } => {
                *cookie
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Anomaly::ReentrantBegin { .. } => "begin on an open cookie without an intervening end",
            Anomaly::EndWithoutBegin { .. } => "end without a matching begin",
        }
    }

    pub fn into_error(self) -> Error {
        Error::new(ErrorKind::Protocol)
            .with_message(self.message())
            .with_set(self.set())
            .with_cookie(self.cookie())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Every anomaly fails the call with `ErrorKind::Protocol`.
    Strict,
    /// Anomalies are logged and counted; the call still yields a track.
    #[default]
    Report,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AnomalyStats {
    pub reentrant_begin: u64,
    pub end_without_begin: u64,
}

impl AnomalyStats {
    pub fn record(&mut self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::ReentrantBegin { .. } => self.reentrant_begin += 1,
            Anomaly::EndWithoutBegin { .. } => self.end_without_begin += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.reentrant_begin + self.end_without_begin
    }
}
