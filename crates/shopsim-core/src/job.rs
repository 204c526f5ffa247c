//! Jobs: routed units of work.
//!
//! A [`JobSpec`] is the descriptor an external producer hands in: the
//! routing (ordered operations), due date, family, and the priority rule the
//! job carries into server queues. The engine turns it into a [`Job`], the
//! mutable runtime record that accumulates timestamps as the job moves
//! through pool, queues, material staging, and processing.
//!
//! Slack arithmetic follows the planned-release convention: each remaining
//! operation is budgeted its processing time plus one `allowance` of queue
//! time, counted backwards from the due date.

use crate::fixed::{Duration, Fixed64, SimTime};
use crate::id::*;
use crate::materials::MaterialPhase;
use crate::policies::PriorityRule;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A material requirement attached to one operation: the operation cannot
/// start until `quantity` units of `product` stand at the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialNeed {
    pub product: ProductId,
    pub quantity: u32,
    /// Pinned source store, or `None` to let the store-selection policy pick.
    pub store: Option<StoreId>,
}

/// One step of a routing: which server, for how long, with what material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub server: ServerId,
    pub processing_time: Duration,
    pub material: Option<MaterialNeed>,
}

impl OperationSpec {
    pub fn new(server: ServerId, processing_time: Duration) -> Self {
        Self {
            server,
            processing_time,
            material: None,
        }
    }

    pub fn with_material(mut self, need: MaterialNeed) -> Self {
        self.material = Some(need);
        self
    }
}

/// Descriptor for a job entering the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub family: FamilyId,
    pub operations: Vec<OperationSpec>,
    pub due_date: SimTime,
    pub priority_rule: PriorityRule,
}

impl JobSpec {
    pub fn new(family: FamilyId, operations: Vec<OperationSpec>, due_date: SimTime) -> Self {
        Self {
            family,
            operations,
            due_date,
            priority_rule: PriorityRule::Fifo,
        }
    }

    pub fn with_priority_rule(mut self, rule: PriorityRule) -> Self {
        self.priority_rule = rule;
        self
    }

    /// Total processing content over the whole routing.
    pub fn total_processing_time(&self) -> Duration {
        self.operations
            .iter()
            .fold(Duration::ZERO, |acc, op| acc + op.processing_time)
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Where a job currently is. Exactly one of pool / queue / staging /
/// in-service / done at any instant.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Registered with a future arrival time; not yet in the pool.
    Scheduled,
    /// Waiting in the pre-shop pool for release.
    Pool,
    /// Waiting in a server queue for operation `op`.
    Queued { op: usize },
    /// Holds the server grant while materials are staged.
    Materializing { op: usize, phase: MaterialPhase },
    /// In service at the operation's server.
    Processing {
        op: usize,
        started_at: SimTime,
        /// Total hold for this visit, setup included.
        hold: Duration,
        /// Work left to do. Counts down only across suspensions.
        remaining: Duration,
        /// True while the server is down and the hold is checkpointed.
        suspended: bool,
    },
    /// Routing exhausted; the record is archived and immutable.
    Done,
}

/// Per-visit timestamps for one operation. Rework appends new entries, so
/// the log can be longer than the routing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpRecord {
    pub op: usize,
    pub server: ServerId,
    pub entered_queue: SimTime,
    pub started: Option<SimTime>,
    pub completed: Option<SimTime>,
}

/// How a finished job landed relative to its delivery window
/// `[due - window, due]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDateBand {
    Early,
    InWindow,
    Tardy,
}

/// The runtime record of a job.
#[derive(Debug, Clone)]
pub struct Job {
    pub family: FamilyId,
    pub operations: Vec<OperationSpec>,
    pub due_date: SimTime,
    pub priority_rule: PriorityRule,

    pub state: JobState,
    /// Set by inspection rework; consumed when the loop-back re-queues.
    pub rework: bool,
    /// Dispatch priority persisted by scored release. Higher is served first.
    pub priority: Fixed64,
    /// Bumped whenever a processing hold is suspended or resumed; stale
    /// completion wakes carry an older value and are ignored.
    pub epoch: u32,

    pub created_at: SimTime,
    pub released_at: Option<SimTime>,
    pub finished_at: Option<SimTime>,
    pub op_log: Vec<OpRecord>,
}

impl Job {
    pub fn from_spec(spec: JobSpec, created_at: SimTime) -> Self {
        Self {
            family: spec.family,
            operations: spec.operations,
            due_date: spec.due_date,
            priority_rule: spec.priority_rule,
            state: JobState::Pool,
            rework: false,
            priority: Fixed64::ZERO,
            epoch: 0,
            created_at,
            released_at: None,
            finished_at: None,
            op_log: Vec::new(),
        }
    }

    /// Index of the operation the job is currently at, `None` once done or
    /// while still pool-side.
    pub fn current_op(&self) -> Option<usize> {
        match self.state {
            JobState::Queued { op }
            | JobState::Materializing { op, .. }
            | JobState::Processing { op, .. } => Some(op),
            _ => None,
        }
    }

    /// The server of the first operation. Routing is validated non-empty at
    /// build time.
    pub fn first_server(&self) -> Option<ServerId> {
        self.operations.first().map(|op| op.server)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, JobState::Done)
    }

    // -----------------------------------------------------------------------
    // Slack arithmetic
    // -----------------------------------------------------------------------

    /// Processing content from operation `from` to the end of the routing.
    pub fn remaining_processing_time(&self, from: usize) -> Duration {
        self.operations[from.min(self.operations.len())..]
            .iter()
            .fold(Duration::ZERO, |acc, op| acc + op.processing_time)
    }

    /// Processing time of the first remaining operation (first overall while
    /// pool-side). Used by shortest-processing-time ranking.
    pub fn first_remaining_processing_time(&self) -> Duration {
        let from = self.current_op().unwrap_or(0);
        self.operations
            .get(from)
            .map(|op| op.processing_time)
            .unwrap_or(Duration::ZERO)
    }

    /// Raw slack: time to due date minus pure remaining processing content.
    pub fn slack_time(&self, now: SimTime) -> Duration {
        let from = self.current_op().unwrap_or(0);
        self.due_date - now - self.remaining_processing_time(from)
    }

    /// Planned slack per remaining operation, computed backwards from the
    /// due date: each operation is budgeted its processing time plus one
    /// `allowance` of queue time. Entry `k` is the slack the job has if it
    /// is about to start remaining operation `k`.
    pub fn planned_slack_times(&self, now: SimTime, allowance: Duration) -> Vec<Duration> {
        let from = self.current_op().unwrap_or(0);
        let remaining = &self.operations[from.min(self.operations.len())..];
        let n = remaining.len();

        let mut budget = Duration::ZERO;
        let mut out = vec![Duration::ZERO; n];
        for k in (0..n).rev() {
            budget += remaining[k].processing_time + allowance;
            out[k] = self.due_date - now - budget;
        }
        out
    }

    /// Planned slack of the next operation. Negative means urgent.
    pub fn planned_slack_time(&self, now: SimTime, allowance: Duration) -> Duration {
        self.planned_slack_times(now, allowance)
            .first()
            .copied()
            .unwrap_or(self.due_date - now)
    }

    /// The time this job ought to leave the pool so that every remaining
    /// operation gets its processing time plus one allowance of queueing.
    pub fn planned_release_date(&self, allowance: Duration) -> SimTime {
        let n = Fixed64::from_num(self.operations.len() as i64);
        let content = self.remaining_processing_time(0);
        self.due_date - content - n * allowance
    }

    // -----------------------------------------------------------------------
    // Completion metrics
    // -----------------------------------------------------------------------

    /// Release to finish. `None` until finished.
    pub fn makespan(&self) -> Option<Duration> {
        match (self.released_at, self.finished_at) {
            (Some(rel), Some(fin)) => Some(fin - rel),
            _ => None,
        }
    }

    /// Creation to finish.
    pub fn time_in_system(&self) -> Option<Duration> {
        self.finished_at.map(|fin| fin - self.created_at)
    }

    /// Creation to release.
    pub fn time_in_pool(&self) -> Option<Duration> {
        self.released_at.map(|rel| rel - self.created_at)
    }

    /// Total time spent waiting in server queues, over all visits.
    pub fn total_queue_time(&self) -> Duration {
        self.op_log
            .iter()
            .filter_map(|rec| rec.started.map(|s| s - rec.entered_queue))
            .fold(Duration::ZERO, |acc, d| acc + d)
    }

    /// Finish minus due. Positive is late. `None` until finished.
    pub fn lateness(&self) -> Option<Duration> {
        self.finished_at.map(|fin| fin - self.due_date)
    }

    pub fn is_tardy(&self) -> bool {
        self.lateness().map(|l| l > Duration::ZERO).unwrap_or(false)
    }

    /// Classify the finish against the delivery window `[due - window, due]`.
    pub fn due_date_band(&self, window: Duration) -> Option<DueDateBand> {
        let lateness = self.lateness()?;
        if lateness > Duration::ZERO {
            Some(DueDateBand::Tardy)
        } else if lateness < -window {
            Some(DueDateBand::Early)
        } else {
            Some(DueDateBand::InWindow)
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
