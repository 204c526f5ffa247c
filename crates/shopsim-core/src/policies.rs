//! Policy configuration: enum-dispatched strategies for release, dispatch,
//! transport selection, store selection, and WIP accounting.
//!
//! These are data. The decision procedures that interpret them live next to
//! the state they read: release logic in `psp`, queue ordering in `server`,
//! AGV and store choice in `materials`, WIP arithmetic in `wip`.

use crate::fixed::{Duration, Fixed64, SimTime};
use crate::id::ServerId;
use crate::job::Job;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

// ---------------------------------------------------------------------------
// Dispatch priority
// ---------------------------------------------------------------------------

/// How a job's queue priority is derived. Higher values are served first;
/// ties fall back to arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriorityRule {
    /// Arrival order only.
    Fifo,
    /// Urgency by planned slack: less slack, higher priority.
    PlannedSlack { allowance: Duration },
    /// Use whatever priority was last persisted on the job (scored release
    /// writes the winning score there).
    Persisted,
}

impl PriorityRule {
    /// Evaluate the rule for a job at the given instant.
    pub fn priority_of(&self, job: &Job, now: SimTime) -> Fixed64 {
        match self {
            PriorityRule::Fifo => Fixed64::ZERO,
            PriorityRule::PlannedSlack { allowance } => -job.planned_slack_time(now, *allowance),
            PriorityRule::Persisted => job.priority,
        }
    }
}

// ---------------------------------------------------------------------------
// Release policies
// ---------------------------------------------------------------------------

/// Weights of the scored release rule. Each term is normalized before
/// weighting by the scored decision procedure in [`crate::psp`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Shortest processing time: favors jobs with a quick first operation.
    pub spt: Fixed64,
    /// Starvation response: favors jobs headed for an empty first queue.
    pub starvation: Fixed64,
    /// Slack urgency: favors jobs with little or negative planned slack.
    pub slack: Fixed64,
    /// Release pacing: grows as actual releases fall behind the target rate.
    pub pace: Fixed64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            spt: Fixed64::from_num(1),
            starvation: Fixed64::from_num(1),
            slack: Fixed64::from_num(1),
            pace: Fixed64::from_num(1),
        }
    }
}

/// When and which pool jobs enter the shop floor.
#[derive(Debug, Clone)]
pub enum ReleasePolicy {
    /// Release on arrival. The baseline: the pool is a pass-through.
    Immediate,
    /// Periodic workload balancing. Every `check_interval`, walk the pool in
    /// planned-release-date order and admit jobs while every routed server
    /// stays below its workload norm.
    WorkloadNorm {
        norms: SecondaryMap<ServerId, Fixed64>,
        allowance: Duration,
        check_interval: Duration,
    },
    /// Event-driven slack repair, evaluated on every operation completion.
    SlackDriven { allowance: Duration },
    /// Event-driven multi-factor dispatch with workload gates.
    Scored {
        weights: ScoreWeights,
        norms: SecondaryMap<ServerId, Fixed64>,
        /// Maximum jobs allowed queued at the first server for a release to
        /// be authorized there.
        authorization_limit: usize,
        /// Desired releases per unit time, for the pacing term.
        target_release_rate: Fixed64,
        allowance: Duration,
    },
}

impl ReleasePolicy {
    /// Whether this policy reacts to operation completions.
    pub fn is_event_driven(&self) -> bool {
        matches!(
            self,
            ReleasePolicy::SlackDriven { .. } | ReleasePolicy::Scored { .. }
        )
    }

    /// The periodic check interval, if this policy uses one.
    pub fn check_interval(&self) -> Option<Duration> {
        match self {
            ReleasePolicy::WorkloadNorm { check_interval, .. } => Some(*check_interval),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource selection
// ---------------------------------------------------------------------------

/// Which AGV serves a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgvSelection {
    /// Fewest queued plus active missions; earliest registration breaks ties.
    LeastWorkload,
    /// Smallest distance from the AGV's current location to the source store.
    NearestToSource,
}

/// Which store serves a material need that is not pinned to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreSelection {
    /// First registered store with enough unreserved stock; falls back to
    /// the first registered store when all are short.
    FirstWithStock,
    /// The store holding the most unreserved stock of the product.
    MostStock,
}

// ---------------------------------------------------------------------------
// WIP accounting
// ---------------------------------------------------------------------------

/// How a job's processing content is charged against server WIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WipStrategy {
    /// Full processing time on every routed server at admission.
    Standard,
    /// Position-discounted: operation `i` (0-based) contributes
    /// `p / (i + 1)` at admission and is promoted as the job advances.
    Corrected,
}

// ===========================================================================
// Tests
// ===========================================================================
