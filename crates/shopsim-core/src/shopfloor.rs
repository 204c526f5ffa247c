//! Shop-floor state: WIP, flow-time EMAs, and the completion archive.
//!
//! The shop floor owns the [`WipTracker`] and the exponentially weighted
//! moving averages the release policies and reports read. Every EMA uses
//! `ema += alpha * (x - ema)` with the first observation taken as-is.
//! Finished jobs are archived as immutable [`CompletedJob`] snapshots;
//! nothing in the engine writes to a record after it lands there.

use crate::fixed::{Duration, Fixed64, SimTime};
use crate::id::{FamilyId, JobId};
use crate::job::{DueDateBand, Job};
use crate::policies::WipStrategy;
use crate::wip::WipTracker;

// ---------------------------------------------------------------------------
// EMA
// ---------------------------------------------------------------------------

/// One exponentially weighted moving average.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ema {
    value: Option<Fixed64>,
}

impl Ema {
    pub fn observe(&mut self, alpha: Fixed64, x: Fixed64) {
        self.value = Some(match self.value {
            Some(ema) => ema + alpha * (x - ema),
            None => x,
        });
    }

    pub fn value(&self) -> Option<Fixed64> {
        self.value
    }
}

/// The flow-time averages the original KPI surface exposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowEmas {
    pub makespan: Ema,
    pub time_in_system: Ema,
    pub time_in_pool: Ema,
    pub total_queue_time: Ema,
    /// Indicator EMAs: share of recent completions in each band.
    pub tardy_share: Ema,
    pub early_share: Ema,
    pub in_window_share: Ema,
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Immutable snapshot of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub job: JobId,
    pub family: FamilyId,
    pub created_at: SimTime,
    pub released_at: SimTime,
    pub finished_at: SimTime,
    pub due_date: SimTime,
    pub makespan: Duration,
    pub lateness: Duration,
    pub band: DueDateBand,
    pub total_queue_time: Duration,
    pub rework_visits: usize,
}

// ---------------------------------------------------------------------------
// ShopFloor
// ---------------------------------------------------------------------------

/// Aggregated floor state. One per engine.
#[derive(Debug)]
pub struct ShopFloor {
    pub ema_alpha: Fixed64,
    pub due_window: Duration,

    wip: WipTracker,
    emas: FlowEmas,
    archive: Vec<CompletedJob>,

    active_jobs: usize,
    peak_active_jobs: usize,
    released: u64,
    finished: u64,
}

impl ShopFloor {
    pub fn new(strategy: WipStrategy, ema_alpha: Fixed64, due_window: Duration) -> Self {
        Self {
            ema_alpha,
            due_window,
            wip: WipTracker::new(strategy),
            emas: FlowEmas::default(),
            archive: Vec::new(),
            active_jobs: 0,
            peak_active_jobs: 0,
            released: 0,
            finished: 0,
        }
    }

    pub fn wip(&self) -> &WipTracker {
        &self.wip
    }

    pub fn wip_mut(&mut self) -> &mut WipTracker {
        &mut self.wip
    }

    /// A job left the pool for the floor.
    pub fn on_release(&mut self, id: JobId, job: &Job) {
        self.wip.charge_release(id, job);
        self.active_jobs += 1;
        self.peak_active_jobs = self.peak_active_jobs.max(self.active_jobs);
        self.released += 1;
    }

    /// An operation finished processing.
    pub fn on_operation_completed(&mut self, id: JobId, job: &Job, op: usize) {
        self.wip.settle_completion(id, job, op);
    }

    /// A rework draw sent the job back to `loopback`.
    pub fn on_rework(&mut self, id: JobId, job: &Job, loopback: usize) {
        self.wip.charge_rework(id, job, loopback);
    }

    /// A job finished its routing: archive it and fold its metrics into the
    /// EMAs. The job record must already carry `finished_at`.
    pub fn on_finished(&mut self, id: JobId, job: &Job) {
        self.wip.forget(id);
        self.active_jobs = self.active_jobs.saturating_sub(1);
        self.finished += 1;

        let (Some(released_at), Some(finished_at)) = (job.released_at, job.finished_at) else {
            return;
        };
        let makespan = finished_at - released_at;
        let lateness = finished_at - job.due_date;
        let band = job.due_date_band(self.due_window).unwrap_or(DueDateBand::InWindow);
        let rework_visits = job.op_log.len().saturating_sub(job.operations.len());

        let a = self.ema_alpha;
        self.emas.makespan.observe(a, makespan);
        self.emas.time_in_system.observe(a, finished_at - job.created_at);
        self.emas.time_in_pool.observe(a, released_at - job.created_at);
        self.emas.total_queue_time.observe(a, job.total_queue_time());

        let one = Fixed64::from_num(1);
        let indicator = |hit: bool| if hit { one } else { Fixed64::ZERO };
        self.emas.tardy_share.observe(a, indicator(band == DueDateBand::Tardy));
        self.emas.early_share.observe(a, indicator(band == DueDateBand::Early));
        self.emas
            .in_window_share
            .observe(a, indicator(band == DueDateBand::InWindow));

        self.archive.push(CompletedJob {
            job: id,
            family: job.family,
            created_at: job.created_at,
            released_at,
            finished_at,
            due_date: job.due_date,
            makespan,
            lateness,
            band,
            total_queue_time: job.total_queue_time(),
            rework_visits,
        });
    }

    pub fn emas(&self) -> &FlowEmas {
        &self.emas
    }

    /// The archive of finished jobs, oldest first. Records are immutable.
    pub fn completed(&self) -> &[CompletedJob] {
        &self.archive
    }

    pub fn active_jobs(&self) -> usize {
        self.active_jobs
    }

    pub fn peak_active_jobs(&self) -> usize {
        self.peak_active_jobs
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }

    pub fn finished_count(&self) -> u64 {
        self.finished
    }
}

// ===========================================================================
// Tests
// ===========================================================================
