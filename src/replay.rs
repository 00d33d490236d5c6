//! Purpose: Feed a JSONL stream of async slice events through the tracker.
//! Exports: `GroupKind`, `Group`, `ReplayEvent`, `Assignment`, `ReplaySummary`, `Replayer`, `replay`.
//! Role: Driver used by the `trackmux replay` command and by integration tests.
//! Invariants: Events are applied strictly in arrival order, one line at a time.
//! Invariants: Blank lines are skipped; any other unparsable line (bad JSON or bad UTF-8)
//!             is a usage error carrying its line number.
use std::io::{self, BufRead, BufReader, Read};

use serde::{Deserialize, Serialize};

use crate::core::anomaly::{Anomaly, AnomalyStats};
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{TrackId, TrackSetId, UniquePid};
use crate::core::storage::TrackTable;
use crate::core::strings::StringPool;
use crate::core::tracker::{AsyncTrackSetTracker, TrackerOptions};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Global,
    Process,
    Timeline,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct Group {
    pub kind: GroupKind,
    #[serde(default)]
    pub upid: Option<u32>,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayEvent {
    Begin { group: Group, cookie: i64 },
    End { group: Group, cookie: i64 },
    Scoped { group: Group, ts: i64, dur: i64 },
}

impl ReplayEvent {
    pub fn op(&self) -> &'static str {
        match self {
            ReplayEvent::Begin { .. } => "begin",
            ReplayEvent::End { .. } => "end",
            ReplayEvent::Scoped { .. } => "scoped",
        }
    }

    fn group(&self) -> &Group {
        match self {
            ReplayEvent::Begin { group, .. }
            | ReplayEvent::End { group, .. }
            | ReplayEvent::Scoped { group, .. } => group,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Assignment {
    pub line: u64,
    pub op: &'static str,
    pub set: TrackSetId,
    pub track: TrackId,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub events: u64,
    pub sets: usize,
    pub tracks: usize,
    pub anomalies: AnomalyStats,
}

pub struct Replayer {
    tracker: AsyncTrackSetTracker<TrackTable>,
    strings: StringPool,
    events: u64,
}

impl Replayer {
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            tracker: AsyncTrackSetTracker::with_options(TrackTable::new(), options),
            strings: StringPool::new(),
            events: 0,
        }
    }

    pub fn apply(&mut self, line: u64, event: &ReplayEvent) -> Result<Assignment, Error> {
        let set = self
            .intern_group(event.group())
            .map_err(|err| err.with_line(line))?;
        let track = match *event {
            ReplayEvent::Begin { cookie, .. } => self.tracker.begin(set, cookie),
            ReplayEvent::End { cookie, .. } => self.tracker.end(set, cookie),
            ReplayEvent::Scoped { ts, dur, .. } => self.tracker.scoped(set, ts, dur),
        }
        .map_err(|err| err.with_line(line))?;
        self.events += 1;
        Ok(Assignment {
            line,
            op: event.op(),
            set,
            track,
        })
    }

    pub fn drain_anomalies(&mut self) -> Vec<Anomaly> {
        self.tracker.drain_anomalies()
    }

    pub fn tracker(&self) -> &AsyncTrackSetTracker<TrackTable> {
        &self.tracker
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            events: self.events,
            sets: self.tracker.track_set_count(),
            tracks: self.tracker.track_count(),
            anomalies: self.tracker.stats(),
        }
    }

    fn intern_group(&mut self, group: &Group) -> Result<TrackSetId, Error> {
        let name = self.strings.intern(&group.name)?;
        match group.kind {
            GroupKind::Global => {
                if group.upid.is_some() {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!(
                            "global group {:?} must not carry a upid",
                            group.name
                        ))
                        .with_hint("Drop the upid, or use a process or timeline group."));
                }
                self.tracker.intern_global_set(name)
            }
            GroupKind::Process => {
                let upid = required_upid(group)?;
                self.tracker.intern_process_set(upid, name)
            }
            GroupKind::Timeline => {
                let upid = required_upid(group)?;
                self.tracker.intern_timeline_set(upid, name)
            }
        }
    }
}

fn required_upid(group: &Group) -> Result<UniquePid, Error> {
    group.upid.map(UniquePid::new).ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("group {:?} requires a upid", group.name))
            .with_hint("Process and timeline groups are keyed by (upid, name).")
    })
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

/// Replays every event in `reader`, reporting assignments and anomalies as they happen.
pub fn replay<R, F, N>(
    reader: R,
    options: TrackerOptions,
    mut on_assignment: F,
    mut on_anomaly: N,
) -> Result<ReplaySummary, Error>
where
    R: Read,
    F: FnMut(Assignment) -> Result<(), Error>,
    N: FnMut(u64, Anomaly),
{
    let mut replayer = Replayer::new(options);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| io_error(err, "failed to read input").with_line(line_no + 1))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let line = std::str::from_utf8(&buf).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid utf-8")
                .with_line(line_no)
                .with_hint("Event streams must be UTF-8 encoded JSONL.")
                .with_source(err)
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(trimmed).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid event")
                .with_line(line_no)
                .with_hint("Each line must be a JSON object with op begin|end|scoped and a group.")
                .with_source(err)
        })?;
        let assignment = replayer.apply(line_no, &event)?;
        for anomaly in replayer.drain_anomalies() {
            on_anomaly(line_no, anomaly);
        }
        on_assignment(assignment)?;
    }
    Ok(replayer.summary())
}
