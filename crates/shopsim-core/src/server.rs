//! Servers: capacity-limited processing resources with priority queues.
//!
//! A server never suspends a caller itself; the engine asks it for grants
//! and the server only does the accounting. The pending queue is kept in
//! strict total order `(priority descending, arrival ascending, sequence
//! ascending)`, so two runs that enqueue the same requests grant them in the
//! same order.
//!
//! Variant behavior (breakdowns, inspection rework) is enum-dispatched via
//! [`ServerKind`]; the engine drives the resulting timeouts and draws.

use crate::agv::Location;
use crate::fixed::{checked_div_64, Duration, Fixed64, SimTime};
use crate::id::JobId;
use crate::rng::Sample;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Behavioral variant of a server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerKind {
    Standard,
    /// Breaks down and repairs on sampled schedules. In-service work is
    /// checkpointed and resumed, never restarted.
    Faulty {
        time_between_failures: Sample,
        repair_time: Sample,
    },
    /// After each completed operation, a rework draw may send the job back
    /// to routing index `loopback`.
    Inspection {
        rework_probability: Fixed64,
        loopback: usize,
    },
}

// ---------------------------------------------------------------------------
// Pending requests
// ---------------------------------------------------------------------------

/// A queued grant request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRequest {
    pub job: JobId,
    pub priority: Fixed64,
    pub arrival: SimTime,
    pub seq: u64,
}

impl PendingRequest {
    /// Strict total order: higher priority first, then earlier arrival,
    /// then earlier enqueue.
    fn sort_key(&self) -> (std::cmp::Reverse<Fixed64>, SimTime, u64) {
        (std::cmp::Reverse(self.priority), self.arrival, self.seq)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A processing resource. Capacity is at least 1 (validated at build time).
#[derive(Debug)]
pub struct Server {
    pub name: String,
    pub capacity: usize,
    pub kind: ServerKind,
    /// Optional pre-processing hook, sampled per operation and added to the
    /// processing hold.
    pub setup: Option<Sample>,
    pub location: Location,

    queue: Vec<PendingRequest>,
    in_service: Vec<JobId>,
    down: bool,
    next_seq: u64,

    // Time-weighted accounting, accrued on every transition.
    last_accrual: SimTime,
    busy_integral: Fixed64,
    queue_integral: Fixed64,
    idle_time: Duration,
    worked_time: Duration,
    grants: u64,
    completed_ops: u64,
    breakdowns: u64,
    repairs: u64,
}

impl Server {
    pub fn new(name: impl Into<String>, capacity: usize, kind: ServerKind) -> Self {
        Self {
            name: name.into(),
            capacity,
            kind,
            setup: None,
            location: Location::default(),
            queue: Vec::new(),
            in_service: Vec::new(),
            down: false,
            next_seq: 0,
            last_accrual: SimTime::ZERO,
            busy_integral: Fixed64::ZERO,
            queue_integral: Fixed64::ZERO,
            idle_time: Duration::ZERO,
            worked_time: Duration::ZERO,
            grants: 0,
            completed_ops: 0,
            breakdowns: 0,
            repairs: 0,
        }
    }

    pub fn with_setup(mut self, setup: Sample) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    // -----------------------------------------------------------------------
    // Queue operations
    // -----------------------------------------------------------------------

    /// Enqueue a grant request. Insertion keeps the strict total order.
    pub fn enqueue(&mut self, job: JobId, priority: Fixed64, now: SimTime) {
        self.accrue(now);
        let request = PendingRequest {
            job,
            priority,
            arrival: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let at = self
            .queue
            .partition_point(|r| r.sort_key() <= request.sort_key());
        self.queue.insert(at, request);
    }

    /// Grant the head of the queue if capacity allows. Down servers grant
    /// nothing.
    pub fn grant_next(&mut self, now: SimTime) -> Option<JobId> {
        if self.down || self.in_service.len() >= self.capacity || self.queue.is_empty() {
            return None;
        }
        self.accrue(now);
        let request = self.queue.remove(0);
        self.in_service.push(request.job);
        self.grants += 1;
        Some(request.job)
    }

    /// Release a grant. The job must hold one.
    pub fn release(&mut self, job: JobId, now: SimTime) {
        self.accrue(now);
        if let Some(pos) = self.in_service.iter().position(|&j| j == job) {
            self.in_service.swap_remove(pos);
        }
    }

    /// Re-key every waiting request from the supplied priority function and
    /// restore the total order. Holders are untouched: escalation never
    /// preempts.
    pub fn sort_queue<F: FnMut(JobId) -> Fixed64>(&mut self, mut priority_of: F) {
        for request in &mut self.queue {
            request.priority = priority_of(request.job);
        }
        self.queue.sort_by_key(|r| r.sort_key());
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.queue.iter().map(|r| r.job)
    }

    pub fn in_service_count(&self) -> usize {
        self.in_service.len()
    }

    pub fn in_service_jobs(&self) -> &[JobId] {
        &self.in_service
    }

    pub fn has_free_capacity(&self) -> bool {
        !self.down && self.in_service.len() < self.capacity
    }

    /// Empty queue and a free slot: the starvation-avoidance trigger.
    pub fn is_starving(&self) -> bool {
        self.queue.is_empty() && self.has_free_capacity()
    }

    // -----------------------------------------------------------------------
    // Breakdown state
    // -----------------------------------------------------------------------

    pub fn is_down(&self) -> bool {
        self.down
    }

    pub fn mark_down(&mut self, now: SimTime) {
        self.accrue(now);
        self.down = true;
        self.breakdowns += 1;
    }

    pub fn mark_repaired(&mut self, now: SimTime) {
        self.accrue(now);
        self.down = false;
        self.repairs += 1;
    }

    pub fn breakdown_count(&self) -> u64 {
        self.breakdowns
    }

    pub fn repair_count(&self) -> u64 {
        self.repairs
    }

    // -----------------------------------------------------------------------
    // Accounting
    // -----------------------------------------------------------------------

    /// Fold the interval since the last transition into the time-weighted
    /// integrals.
    fn accrue(&mut self, now: SimTime) {
        let dt = now - self.last_accrual;
        if dt <= Duration::ZERO {
            self.last_accrual = self.last_accrual.max(now);
            return;
        }
        let busy = Fixed64::from_num(self.in_service.len() as i64);
        self.busy_integral += busy * dt;
        self.queue_integral += Fixed64::from_num(self.queue.len() as i64) * dt;
        if self.in_service.is_empty() && !self.down {
            self.idle_time += dt;
        }
        self.last_accrual = now;
    }

    /// Record completed processing content (setup included).
    pub fn add_worked_time(&mut self, amount: Duration) {
        self.worked_time += amount;
        self.completed_ops += 1;
    }

    pub fn worked_time(&self) -> Duration {
        self.worked_time
    }

    pub fn completed_ops(&self) -> u64 {
        self.completed_ops
    }

    pub fn grant_count(&self) -> u64 {
        self.grants
    }

    /// Time-averaged queue length over `[0, now]`.
    pub fn average_queue_length(&mut self, now: SimTime) -> Fixed64 {
        self.accrue(now);
        checked_div_64(self.queue_integral, now).unwrap_or(Fixed64::ZERO)
    }

    /// Busy slot-time over total slot-time, in `[0, 1]`.
    pub fn utilization_rate(&mut self, now: SimTime) -> Fixed64 {
        self.accrue(now);
        let total = now * Fixed64::from_num(self.capacity as i64);
        checked_div_64(self.busy_integral, total).unwrap_or(Fixed64::ZERO)
    }

    /// Total time with no job in service (down time excluded).
    pub fn idle_time(&mut self, now: SimTime) -> Duration {
        self.accrue(now);
        self.idle_time
    }
}

// ===========================================================================
// Tests
// ===========================================================================
