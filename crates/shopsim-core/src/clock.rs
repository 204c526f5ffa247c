//! Cooperative event clock.
//!
//! A min-heap of `(SimTime, sequence, Wake)` entries. Time never flows on its
//! own: it jumps to the timestamp of the next pending wake when the engine
//! pops it. Wakes scheduled for the same instant pop in schedule order (the
//! sequence number is assigned at schedule time), so identical runs replay
//! identical wake orders.
//!
//! Timeouts that may be cancelled (processing holds interrupted by a
//! breakdown) are not removed from the heap; the owning entity bumps an
//! epoch counter instead and the stale wake is ignored when it surfaces.

use crate::fixed::{Duration, SimTime};
use crate::id::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

// ---------------------------------------------------------------------------
// Wake — the closed set of resumption points
// ---------------------------------------------------------------------------

/// A scheduled resumption. Everything that can happen "later" in a run is
/// one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// A pre-registered job enters the pre-shop pool.
    Arrival { job: JobId },
    /// Ask the job source for its next job, then re-arm.
    SourcePull,
    /// Periodic release-policy check.
    PspCheck,
    /// A processing hold elapses. Ignored if the job's interrupt epoch moved on.
    ProcessingDone { job: JobId, epoch: u32 },
    /// A warehouse pick hold elapses.
    PickDone { job: JobId },
    /// AGV finished loading at the store.
    AgvLoadDone { job: JobId, agv: AgvId },
    /// AGV arrived at the destination server.
    AgvTravelDone { job: JobId, agv: AgvId },
    /// AGV finished unloading; the material requirement is satisfied.
    AgvUnloadDone { job: JobId, agv: AgvId },
    /// A faulty server breaks down.
    Breakdown { server: ServerId },
    /// A faulty server finishes repair.
    RepairDone { server: ServerId },
    /// A scheduled deposit's put hold elapses; stock becomes available.
    PutDone {
        store: StoreId,
        product: ProductId,
        quantity: u32,
    },
}

// ---------------------------------------------------------------------------
// Heap entry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    at: SimTime,
    seq: u64,
    wake: Wake,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so BinaryHeap pops the earliest (time, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// The event clock. Owns the pending-wake heap and the current time.
#[derive(Debug)]
pub struct Clock {
    now: SimTime,
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    interrupted: bool,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            heap: BinaryHeap::new(),
            next_seq: 0,
            interrupted: false,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule a wake at an absolute time. Times in the past are clamped
    /// to the present (the wake fires immediately on the next pop).
    pub fn schedule(&mut self, at: SimTime, wake: Wake) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { at, seq, wake });
    }

    /// Schedule a wake after a delay from the present. Negative delays are
    /// treated as zero.
    pub fn schedule_after(&mut self, delay: Duration, wake: Wake) {
        let delay = delay.max(Duration::ZERO);
        self.schedule(self.now + delay, wake);
    }

    /// Timestamp of the next pending wake, if any. Does not advance time.
    pub fn peek_next(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.at)
    }

    /// Pop the next wake if it is due at or before `until`, advancing the
    /// clock to its timestamp. Returns `None` when the next wake lies beyond
    /// the bound (or the heap is empty); the clock does not advance then.
    pub fn pop_next_before(&mut self, until: SimTime) -> Option<(SimTime, Wake)> {
        match self.heap.peek() {
            Some(entry) if entry.at <= until => {}
            _ => return None,
        }
        let entry = self.heap.pop()?;
        debug_assert!(entry.at >= self.now);
        self.now = entry.at;
        Some((entry.at, entry.wake))
    }

    /// Advance the clock to `at` without popping anything. Used to land the
    /// run loop exactly on its bound. Never moves backwards.
    pub fn advance_to(&mut self, at: SimTime) {
        self.now = self.now.max(at);
    }

    /// Number of pending wakes.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Request that the current run unwind at the next loop iteration.
    /// Sticky: the run cannot be resumed afterwards.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
