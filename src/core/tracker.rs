//! Purpose: Multiplex async slices onto the fewest physical tracks that never overlap.
//! Exports: `AsyncTrackSetTracker`, `TrackerOptions`.
//! Role: Callers intern a group key once, then ask for a track right before each
//!       slice begin/end (or for a whole bounded slice via `scoped`).
//! Invariants: Interning is idempotent per (kind, key); set ids are dense and never reused.
//! Invariants: A track never hosts two open slices unless the cookie matches and the
//!             set's nesting behaviour allows collapsing.
//! Invariants: Track sequences only grow; new tracks come only from `create_track_for_set`.
//! Notes: Single-threaded by construction; every call completes synchronously.
use std::collections::BTreeMap;

use crate::core::anomaly::{Anomaly, AnomalyPolicy, AnomalyStats};
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{StringId, TrackId, TrackSetId, UniquePid};
use crate::core::state::{
    NestingBehaviour, ProcessKey, SliceSlot, TrackSet, TrackSetKey, TrackState,
};
use crate::core::storage::{TrackDescriptor, TrackStore};

const DEFAULT_MAX_RECORDED: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TrackerOptions {
    pub anomaly_policy: AnomalyPolicy,
    /// Upper bound on anomalies retained for `drain_anomalies`; counters are unbounded.
    pub max_recorded: usize,
}

impl TrackerOptions {
    pub fn new() -> Self {
        Self {
            anomaly_policy: AnomalyPolicy::Report,
            max_recorded: DEFAULT_MAX_RECORDED,
        }
    }

    pub fn strict() -> Self {
        Self::new().with_policy(AnomalyPolicy::Strict)
    }

    pub fn with_policy(mut self, policy: AnomalyPolicy) -> Self {
        self.anomaly_policy = policy;
        self
    }

    pub fn with_max_recorded(mut self, max_recorded: usize) -> Self {
        self.max_recorded = max_recorded;
        self
    }
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AsyncTrackSetTracker<S: TrackStore> {
    store: S,
    options: TrackerOptions,
    global_set_ids: BTreeMap<StringId, TrackSetId>,
    process_set_ids: BTreeMap<ProcessKey, TrackSetId>,
    timeline_set_ids: BTreeMap<ProcessKey, TrackSetId>,
    track_sets: Vec<TrackSet>,
    stats: AnomalyStats,
    recorded: Vec<Anomaly>,
}

impl<S: TrackStore> AsyncTrackSetTracker<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, TrackerOptions::default())
    }

    pub fn with_options(store: S, options: TrackerOptions) -> Self {
        Self {
            store,
            options,
            global_set_ids: BTreeMap::new(),
            process_set_ids: BTreeMap::new(),
            timeline_set_ids: BTreeMap::new(),
            track_sets: Vec::new(),
            stats: AnomalyStats::default(),
            recorded: Vec::new(),
        }
    }

    /// Interns the set of global async tracks named `name`.
    pub fn intern_global_set(&mut self, name: StringId) -> Result<TrackSetId, Error> {
        if let Some(id) = self.global_set_ids.get(&name) {
            return Ok(*id);
        }
        let id = push_set(&mut self.track_sets, TrackSetKey::Global { name })?;
        self.global_set_ids.insert(name, id);
        Ok(id)
    }

    /// Interns the set of per-process async tracks for (`upid`, `name`).
    /// `scoped` is not supported on these sets.
    pub fn intern_process_set(
        &mut self,
        upid: UniquePid,
        name: StringId,
    ) -> Result<TrackSetId, Error> {
        let key = ProcessKey { upid, name };
        if let Some(id) = self.process_set_ids.get(&key) {
            return Ok(*id);
        }
        let id = push_set(&mut self.track_sets, TrackSetKey::ProcessScoped(key))?;
        self.process_set_ids.insert(key, id);
        Ok(id)
    }

    /// Interns the expected/actual frame timeline tracks for (`upid`, `name`).
    pub fn intern_timeline_set(
        &mut self,
        upid: UniquePid,
        name: StringId,
    ) -> Result<TrackSetId, Error> {
        let key = ProcessKey { upid, name };
        if let Some(id) = self.timeline_set_ids.get(&key) {
            return Ok(*id);
        }
        let id = push_set(&mut self.track_sets, TrackSetKey::TimelinePair(key))?;
        self.timeline_set_ids.insert(key, id);
        Ok(id)
    }

    /// Picks the track for a slice beginning with `cookie`.
    ///
    /// Reuses the track already holding `cookie`, else the first free cookie
    /// track, else mints a new one.
    pub fn begin(&mut self, id: TrackSetId, cookie: i64) -> Result<TrackId, Error> {
        let set = self
            .track_sets
            .get_mut(id.index())
            .ok_or_else(|| unknown_set(id))?;
        let nesting = set.nesting();

        if let Some(track) = set.tracks.iter_mut().find(|track| track.holds_cookie(cookie)) {
            let track_id = track.id;
            if let SliceSlot::Cookie { nest_count, .. } = &mut track.slot {
                if *nest_count == 0 {
                    *nest_count = 1;
                    tracing::trace!(set = %id, cookie, track = %track_id, "reopened cookie track");
                    return Ok(track_id);
                }
                match nesting {
                    NestingBehaviour::LegacySaturatingUnnestable => {
                        *nest_count = nest_count.saturating_add(1);
                        tracing::trace!(
                            set = %id,
                            cookie,
                            nest_count = *nest_count,
                            "collapsed saturating begin"
                        );
                        return Ok(track_id);
                    }
                    NestingBehaviour::Unnestable => {
                        self.report(Anomaly::ReentrantBegin { set: id, cookie })?;
                        return Ok(track_id);
                    }
                }
            }
        }

        if let Some(track) = set.tracks.iter_mut().find(|track| track.is_free_cookie_track()) {
            track.slot = SliceSlot::Cookie {
                cookie,
                nest_count: 1,
            };
            tracing::trace!(set = %id, cookie, track = %track.id, "reused free track");
            return Ok(track.id);
        }

        create_track_for_set(
            &mut self.store,
            id,
            set,
            SliceSlot::Cookie {
                cookie,
                nest_count: 1,
            },
        )
    }

    /// Picks the track for a slice ending with `cookie` and releases one nesting level.
    pub fn end(&mut self, id: TrackSetId, cookie: i64) -> Result<TrackId, Error> {
        let set = self
            .track_sets
            .get_mut(id.index())
            .ok_or_else(|| unknown_set(id))?;

        let mut closed_match = None;
        if let Some(track) = set.tracks.iter_mut().find(|track| track.holds_cookie(cookie)) {
            if let SliceSlot::Cookie { nest_count, .. } = &mut track.slot {
                if *nest_count > 0 {
                    *nest_count -= 1;
                    tracing::trace!(
                        set = %id,
                        cookie,
                        nest_count = *nest_count,
                        track = %track.id,
                        "ended cookie slice"
                    );
                    return Ok(track.id);
                }
                closed_match = Some(track.id);
            }
        }

        let fallback = closed_match.or_else(|| {
            set.tracks
                .iter()
                .find(|track| track.is_free_cookie_track())
                .map(|track| track.id)
        });
        self.report(Anomaly::EndWithoutBegin { set: id, cookie })?;
        if let Some(track_id) = fallback {
            return Ok(track_id);
        }

        // Best-effort track for the caller; it is left free.
        let set = &mut self.track_sets[id.index()];
        create_track_for_set(
            &mut self.store,
            id,
            set,
            SliceSlot::Cookie {
                cookie,
                nest_count: 0,
            },
        )
    }

    /// Places the bounded slice [`ts`, `ts + dur`) on a track free at `ts`.
    pub fn scoped(&mut self, id: TrackSetId, ts: i64, dur: i64) -> Result<TrackId, Error> {
        let set = self
            .track_sets
            .get_mut(id.index())
            .ok_or_else(|| unknown_set(id))?;
        if !set.kind().supports_scoped() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "scoped slices are not supported on {} track sets",
                    set.kind().as_str()
                ))
                .with_set(id)
                .with_hint("Use begin/end with a cookie for per-process async slices."));
        }
        if dur < 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("negative duration {dur}"))
                .with_set(id));
        }
        let ts_end = ts.saturating_add(dur);

        if let Some(track) = set.tracks.iter_mut().find(|track| track.is_free_at(ts)) {
            track.slot = SliceSlot::Timestamp { ts_end };
            tracing::trace!(set = %id, ts, ts_end, track = %track.id, "reused timestamp track");
            return Ok(track.id);
        }

        create_track_for_set(
            &mut self.store,
            id,
            set,
            SliceSlot::Timestamp { ts_end },
        )
    }

    pub fn track_set(&self, id: TrackSetId) -> Option<&TrackSet> {
        self.track_sets.get(id.index())
    }

    pub fn track_set_count(&self) -> usize {
        self.track_sets.len()
    }

    pub fn track_count(&self) -> usize {
        self.track_sets.iter().map(|set| set.tracks().len()).sum()
    }

    pub fn stats(&self) -> AnomalyStats {
        self.stats
    }

    /// Returns retained anomalies in arrival order and clears the buffer.
    pub fn drain_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.recorded)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn report(&mut self, anomaly: Anomaly) -> Result<(), Error> {
        self.stats.record(&anomaly);
        match self.options.anomaly_policy {
            AnomalyPolicy::Strict => Err(anomaly.into_error()),
            AnomalyPolicy::Report => {
                tracing::warn!(
                    kind = anomaly.label(),
                    set = %anomaly.set(),
                    cookie = anomaly.cookie(),
                    "{}",
                    anomaly.message()
                );
                if self.recorded.len() < self.options.max_recorded {
                    self.recorded.push(anomaly);
                }
                Ok(())
            }
        }
    }

    /// Registers an unnestable per-process set outside the interning tables.
    #[cfg(test)]
    pub(crate) fn create_unnestable_set_for_testing(
        &mut self,
        upid: UniquePid,
        name: StringId,
    ) -> TrackSetId {
        let id = TrackSetId::from_index(self.track_sets.len()).expect("set id space");
        self.track_sets.push(TrackSet::new(
            TrackSetKey::ProcessScoped(ProcessKey { upid, name }),
            NestingBehaviour::Unnestable,
        ));
        id
    }
}

fn push_set(track_sets: &mut Vec<TrackSet>, key: TrackSetKey) -> Result<TrackSetId, Error> {
    let id = TrackSetId::from_index(track_sets.len())?;
    let nesting = key.kind().default_nesting();
    track_sets.push(TrackSet::new(key, nesting));
    tracing::debug!(set = %id, kind = key.kind().as_str(), ?nesting, "interned track set");
    Ok(id)
}

fn create_track_for_set<S: TrackStore>(
    store: &mut S,
    id: TrackSetId,
    set: &mut TrackSet,
    slot: SliceSlot,
) -> Result<TrackId, Error> {
    let key = set.key();
    let track_id = store.create_track(TrackDescriptor {
        set: id,
        kind: key.kind(),
        upid: key.upid(),
        name: key.name(),
    })?;
    set.tracks.push(TrackState { id: track_id, slot });
    tracing::debug!(
        set = %id,
        track = %track_id,
        tracks_in_set = set.tracks.len(),
        "created track"
    );
    Ok(track_id)
}

fn unknown_set(id: TrackSetId) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("unknown track set")
        .with_set(id)
        .with_hint("Track set ids must come from one of the intern_* calls on this tracker.")
}
