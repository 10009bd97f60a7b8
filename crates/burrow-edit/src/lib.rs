//! Debounced rebuild requests and per-chunk revision tracking.
#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use burrow_geom::ChunkCoord;
use hashbrown::HashMap;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Per-chunk debounce state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildState {
    Idle,
    RebuildPending { deadline: Instant },
}

/// What a rebuild request did to the chunk's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Chunk was idle; a new delay window started.
    Scheduled,
    /// Chunk was already pending; the request joined it and the deadline held.
    Coalesced,
}

/// A chunk whose delay window elapsed, with the newest revision it must reflect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueRebuild {
    pub coord: ChunkCoord,
    pub rev: u64,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub pending: usize,
    pub rev_entries: usize,
    pub built_entries: usize,
    pub requests: u64,
    pub coalesced: u64,
    pub dispatched: u64,
}

/// Debounce state machine for every chunk plus change tracking.
///
/// Each request bumps a monotonically increasing stamp. A chunk's `rev` is the
/// newest stamp requested for it; `built` is the newest stamp whose mesh was
/// adopted. Nothing here reads a clock on its own: callers pass `now`.
pub struct RebuildScheduler {
    debounce: Duration,
    // Chunks in RebuildPending -> deadline
    pending: HashMap<ChunkCoord, Instant>,
    rev: HashMap<ChunkCoord, u64>,
    built: HashMap<ChunkCoord, u64>,
    counter: u64,
    requests: u64,
    coalesced: u64,
    dispatched: u64,
}

impl Default for RebuildScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RebuildScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: HashMap::new(),
            rev: HashMap::new(),
            built: HashMap::new(),
            counter: 0,
            requests: 0,
            coalesced: 0,
            dispatched: 0,
        }
    }

    #[inline]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            pending: self.pending.len(),
            rev_entries: self.rev.len(),
            built_entries: self.built.len(),
            requests: self.requests,
            coalesced: self.coalesced,
            dispatched: self.dispatched,
        }
    }

    /// Records a change to `coord` at `now` and returns whether a new delay
    /// window was opened.
    pub fn request_at(&mut self, coord: ChunkCoord, now: Instant) -> RequestOutcome {
        self.counter = self.counter.wrapping_add(1).max(1);
        self.rev.insert(coord, self.counter);
        self.requests += 1;
        if self.pending.contains_key(&coord) {
            self.coalesced += 1;
            return RequestOutcome::Coalesced;
        }
        self.pending.insert(coord, now + self.debounce);
        log::debug!(target: "rebuild", "scheduled {} rev={}", coord, self.counter);
        RequestOutcome::Scheduled
    }

    #[inline]
    pub fn request(&mut self, coord: ChunkCoord) -> RequestOutcome {
        self.request_at(coord, Instant::now())
    }

    pub fn state(&self, coord: ChunkCoord) -> RebuildState {
        match self.pending.get(&coord) {
            Some(&deadline) => RebuildState::RebuildPending { deadline },
            None => RebuildState::Idle,
        }
    }

    #[inline]
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains_key(&coord)
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline across all pending chunks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Moves every chunk whose deadline is at or before `now` back to `Idle`
    /// and returns them ordered by coordinate.
    pub fn poll_due(&mut self, now: Instant) -> Vec<DueRebuild> {
        let mut due: Vec<ChunkCoord> = self
            .pending
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(c, _)| *c)
            .collect();
        due.sort_unstable();
        for c in &due {
            self.pending.remove(c);
        }
        self.dispatch(due)
    }

    /// Treats every pending chunk as due immediately.
    pub fn force_all(&mut self) -> Vec<DueRebuild> {
        let mut due: Vec<ChunkCoord> = self.pending.drain().map(|(c, _)| c).collect();
        due.sort_unstable();
        self.dispatch(due)
    }

    fn dispatch(&mut self, due: Vec<ChunkCoord>) -> Vec<DueRebuild> {
        self.dispatched += due.len() as u64;
        due.into_iter()
            .map(|coord| DueRebuild {
                coord,
                rev: self.get_rev(coord),
            })
            .collect()
    }

    pub fn get_rev(&self, coord: ChunkCoord) -> u64 {
        self.rev.get(&coord).copied().unwrap_or(0)
    }

    /// Records that a mesh reflecting `rev` was adopted. Older stamps are ignored.
    pub fn mark_built(&mut self, coord: ChunkCoord, rev: u64) {
        let e = self.built.entry(coord).or_insert(0);
        if rev > *e {
            *e = rev;
        }
    }

    pub fn get_built_rev(&self, coord: ChunkCoord) -> u64 {
        self.built.get(&coord).copied().unwrap_or(0)
    }

    /// True when a result stamped `rev` would replace something older.
    #[inline]
    pub fn is_fresh(&self, coord: ChunkCoord, rev: u64) -> bool {
        rev > self.get_built_rev(coord)
    }

    pub fn needs_rebuild(&self, coord: ChunkCoord) -> bool {
        self.get_rev(coord) > self.get_built_rev(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn idle_request_opens_window() {
        let mut s = RebuildScheduler::new(ms(50));
        let t0 = Instant::now();
        let c = ChunkCoord::new(1, 0, 1);
        assert_eq!(s.state(c), RebuildState::Idle);
        assert_eq!(s.request_at(c, t0), RequestOutcome::Scheduled);
        assert_eq!(
            s.state(c),
            RebuildState::RebuildPending {
                deadline: t0 + ms(50)
            }
        );
        assert_eq!(s.next_deadline(), Some(t0 + ms(50)));
    }

    #[test]
    fn pending_requests_do_not_move_deadline() {
        let mut s = RebuildScheduler::new(ms(50));
        let t0 = Instant::now();
        let c = ChunkCoord::new(0, 0, 0);
        s.request_at(c, t0);
        assert_eq!(s.request_at(c, t0 + ms(10)), RequestOutcome::Coalesced);
        assert_eq!(s.request_at(c, t0 + ms(40)), RequestOutcome::Coalesced);
        assert_eq!(s.next_deadline(), Some(t0 + ms(50)));
        assert!(s.poll_due(t0 + ms(49)).is_empty());
        let due = s.poll_due(t0 + ms(50));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].rev, s.get_rev(c));
        assert_eq!(s.state(c), RebuildState::Idle);
        let st = s.stats();
        assert_eq!((st.requests, st.coalesced, st.dispatched), (3, 2, 1));
    }

    #[test]
    fn due_rebuilds_are_sorted_and_partial() {
        let mut s = RebuildScheduler::new(ms(20));
        let t0 = Instant::now();
        let (a, b, late) = (
            ChunkCoord::new(1, 0, 0),
            ChunkCoord::new(0, 0, 1),
            ChunkCoord::new(0, 0, 0),
        );
        s.request_at(a, t0);
        s.request_at(b, t0);
        s.request_at(late, t0 + ms(15));
        let due: Vec<ChunkCoord> = s.poll_due(t0 + ms(25)).into_iter().map(|d| d.coord).collect();
        assert_eq!(due, vec![b, a]);
        assert!(s.is_pending(late));
        let rest = s.force_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(s.pending_count(), 0);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn built_rev_only_moves_forward() {
        let mut s = RebuildScheduler::default();
        let c = ChunkCoord::new(2, 0, 3);
        s.request(c);
        let r1 = s.get_rev(c);
        s.request(c);
        let r2 = s.get_rev(c);
        assert!(r2 > r1);
        assert!(s.needs_rebuild(c));
        s.mark_built(c, r2);
        s.mark_built(c, r1);
        assert_eq!(s.get_built_rev(c), r2);
        assert!(!s.needs_rebuild(c));
        assert!(!s.is_fresh(c, r1));
    }

    #[test]
    fn window_reopens_after_dispatch() {
        let mut s = RebuildScheduler::new(ms(30));
        let t0 = Instant::now();
        let c = ChunkCoord::new(0, 0, 0);
        s.request_at(c, t0);
        let first = s.poll_due(t0 + ms(30));
        assert_eq!(first.len(), 1);
        // An edit during extraction opens the next cycle.
        assert_eq!(s.request_at(c, t0 + ms(31)), RequestOutcome::Scheduled);
        let second = s.poll_due(t0 + ms(61));
        assert_eq!(second.len(), 1);
        assert!(second[0].rev > first[0].rev);
    }
}
