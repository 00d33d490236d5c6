//! Purpose: Exercise the tracker through the public API with concrete and seeded scenarios.
//! Exports: Integration tests only.
//! Role: Guard the no-overlap invariant and first-fit track reuse end to end.
//! Invariants: Randomized cases are deterministic (fixed xorshift seeds).
use std::collections::{HashMap, HashSet};

use trackmux::api::{
    Anomaly, AsyncTrackSetTracker, ErrorKind, StringId, StringPool, TrackId, TrackTable,
    TrackerOptions, UniquePid,
};

struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_range(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        self.next_u64() % max
    }
}

fn tracker() -> AsyncTrackSetTracker<TrackTable> {
    AsyncTrackSetTracker::new(TrackTable::new())
}

#[test]
fn process_set_scenario_reuses_freed_track() {
    let mut strings = StringPool::new();
    let mut tracker = tracker();
    let name = strings.intern("X").expect("intern");
    let set = tracker
        .intern_process_set(UniquePid::new(42), name)
        .expect("intern");

    let a = tracker.begin(set, 1).expect("begin 1");
    let b = tracker.begin(set, 2).expect("begin 2");
    assert_ne!(a, b);
    assert_eq!(tracker.end(set, 1).expect("end 1"), a);
    assert_eq!(tracker.begin(set, 3).expect("begin 3"), a);

    let tracks = tracker.track_set(set).expect("set").tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracker.store().len(), 2);
}

#[test]
fn saturating_collapse_returns_one_track_four_times() {
    let mut tracker = tracker();
    let set = tracker.intern_process_set(UniquePid::new(7), StringId::new(0)).expect("intern");

    let ids = [
        tracker.begin(set, 5).expect("begin"),
        tracker.begin(set, 5).expect("begin"),
        tracker.end(set, 5).expect("end"),
    ];
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(tracker.track_set(set).expect("set").open_count(), 1);

    assert_eq!(tracker.end(set, 5).expect("end"), ids[0]);
    assert_eq!(tracker.track_set(set).expect("set").open_count(), 0);
    assert_eq!(tracker.stats().total(), 0);
}

#[test]
fn scoped_scenario_splits_overlapping_intervals() {
    let mut tracker = tracker();
    let set = tracker.intern_global_set(StringId::new(0)).expect("intern");

    let a = tracker.scoped(set, 100, 50).expect("scoped");
    assert_eq!(tracker.scoped(set, 200, 10).expect("scoped"), a);
    let b = tracker.scoped(set, 120, 5).expect("scoped");
    assert_ne!(a, b);
}

#[test]
fn unmatched_end_is_reported_without_touching_open_slices() {
    let mut tracker = tracker();
    let set = tracker.intern_timeline_set(UniquePid::new(1), StringId::new(3)).expect("intern");
    tracker.begin(set, 1).expect("begin");

    tracker.end(set, 99).expect("reported end");
    let open: Vec<_> = tracker
        .track_set(set)
        .expect("set")
        .tracks()
        .iter()
        .filter_map(|track| track.nest_count())
        .collect();
    assert_eq!(open, vec![1, 0]);
    assert_eq!(
        tracker.drain_anomalies(),
        vec![Anomaly::EndWithoutBegin { set, cookie: 99 }]
    );
}

#[test]
fn strict_tracker_surfaces_anomalies_as_errors() {
    let mut tracker = AsyncTrackSetTracker::with_options(TrackTable::new(), TrackerOptions::strict());
    let set = tracker.intern_global_set(StringId::new(0)).expect("intern");
    let err = tracker.end(set, 1).expect_err("strict end");
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(tracker.track_count(), 0);
}

#[test]
fn prop_cookie_tracks_never_overlap_and_stay_minimal() {
    for seed in [1u64, 7, 42, 99, 1234] {
        let mut rng = XorShift64::new(seed);
        let mut tracker = tracker();
        let set = tracker.intern_global_set(StringId::new(0)).expect("intern");
        let mut open_by_track: HashMap<TrackId, i64> = HashMap::new();
        let mut peak = 0usize;

        for _ in 0..500 {
            let cookie = rng.next_range(12) as i64;
            let is_open = open_by_track.values().any(|open| *open == cookie);
            if is_open {
                let track = tracker.end(set, cookie).expect("end");
                assert_eq!(open_by_track.remove(&track), Some(cookie));
            } else {
                let track = tracker.begin(set, cookie).expect("begin");
                assert!(
                    open_by_track.insert(track, cookie).is_none(),
                    "seed {seed}: track {track} already hosts an open slice"
                );
                peak = peak.max(open_by_track.len());
            }
        }

        assert_eq!(tracker.stats().total(), 0);
        assert_eq!(tracker.track_count(), peak, "seed {seed}");
    }
}

#[test]
fn prop_scoped_intervals_never_overlap_on_a_track() {
    for seed in [3u64, 11, 2024] {
        let mut rng = XorShift64::new(seed);
        let mut tracker = tracker();
        let set = tracker
            .intern_timeline_set(UniquePid::new(1), StringId::new(0))
            .expect("intern");
        let mut intervals: HashMap<TrackId, Vec<(i64, i64)>> = HashMap::new();

        for _ in 0..300 {
            let ts = rng.next_range(10_000) as i64;
            let dur = rng.next_range(500) as i64;
            let track = tracker.scoped(set, ts, dur).expect("scoped");
            let placed = intervals.entry(track).or_default();
            for &(start, end) in placed.iter() {
                assert!(
                    !(start < ts + dur && ts < end),
                    "seed {seed}: [{ts}, {}) overlaps [{start}, {end}) on track {track}",
                    ts + dur
                );
            }
            placed.push((ts, ts + dur));
        }
    }
}

#[test]
fn prop_saturating_process_set_never_shares_a_busy_track() {
    for seed in [5u64, 17, 314, 8086] {
        let mut rng = XorShift64::new(seed);
        let mut tracker = tracker();
        let set = tracker
            .intern_process_set(UniquePid::new(9), StringId::new(1))
            .expect("intern");
        // cookie -> (track, depth) for every cookie with depth > 0.
        let mut open: HashMap<i64, (TrackId, u32)> = HashMap::new();
        let mut peak = 0usize;

        for _ in 0..600 {
            let cookie = rng.next_range(10) as i64;
            let close = rng.next_range(2) == 0;
            match open.get(&cookie).copied() {
                Some((track, depth)) if close => {
                    assert_eq!(tracker.end(set, cookie).expect("end"), track, "seed {seed}");
                    if depth == 1 {
                        open.remove(&cookie);
                    } else {
                        open.insert(cookie, (track, depth - 1));
                    }
                }
                Some((track, depth)) => {
                    assert_eq!(tracker.begin(set, cookie).expect("begin"), track, "seed {seed}");
                    open.insert(cookie, (track, depth + 1));
                }
                None if close => {}
                None => {
                    let track = tracker.begin(set, cookie).expect("begin");
                    assert!(
                        open.values().all(|(busy, _)| *busy != track),
                        "seed {seed}: cookie {cookie} landed on busy track {track}"
                    );
                    open.insert(cookie, (track, 1));
                    peak = peak.max(open.len());
                }
            }
        }

        assert_eq!(tracker.stats().total(), 0, "seed {seed}");
        assert_eq!(tracker.track_count(), peak, "seed {seed}");
    }
}

#[test]
fn prop_mixed_cookie_and_scoped_slices_stay_apart() {
    for seed in [2u64, 23, 777] {
        let mut rng = XorShift64::new(seed);
        let mut tracker = tracker();
        let set = tracker
            .intern_timeline_set(UniquePid::new(4), StringId::new(2))
            .expect("intern");
        let mut open_by_track: HashMap<TrackId, i64> = HashMap::new();
        let mut cookie_tracks: HashSet<TrackId> = HashSet::new();
        let mut intervals: HashMap<TrackId, Vec<(i64, i64)>> = HashMap::new();

        for _ in 0..600 {
            if rng.next_range(3) == 0 {
                let ts = rng.next_range(5_000) as i64;
                let dur = rng.next_range(300) as i64;
                let track = tracker.scoped(set, ts, dur).expect("scoped");
                assert!(
                    !cookie_tracks.contains(&track),
                    "seed {seed}: scoped slice landed on cookie track {track}"
                );
                let placed = intervals.entry(track).or_default();
                assert!(
                    placed.iter().all(|&(start, end)| end <= ts || ts + dur <= start),
                    "seed {seed}: [{ts}, {}) overlaps on track {track}",
                    ts + dur
                );
                placed.push((ts, ts + dur));
                continue;
            }

            let cookie = rng.next_range(8) as i64;
            if open_by_track.values().any(|open| *open == cookie) {
                let track = tracker.end(set, cookie).expect("end");
                assert_eq!(open_by_track.remove(&track), Some(cookie), "seed {seed}");
            } else {
                let track = tracker.begin(set, cookie).expect("begin");
                assert!(
                    !intervals.contains_key(&track),
                    "seed {seed}: cookie slice landed on timestamp track {track}"
                );
                assert!(
                    open_by_track.insert(track, cookie).is_none(),
                    "seed {seed}: track {track} already hosts an open slice"
                );
                cookie_tracks.insert(track);
            }
        }

        assert_eq!(tracker.stats().total(), 0, "seed {seed}");
        assert_eq!(
            tracker.track_count(),
            cookie_tracks.len() + intervals.len(),
            "seed {seed}"
        );
    }
}
