//! Work-in-process accounting.
//!
//! Release policies need a per-server load figure that reflects how far
//! away each admitted job still is. Under the corrected strategy a job
//! charges operation `k` (counted from its current position) with
//! `p_k / (k + 1)`: distant work weighs less, and the charge is promoted
//! toward the full processing time as the job advances. The standard
//! strategy charges full processing times everywhere.
//!
//! The tracker keeps the exact amount currently charged per job and
//! operation, so settling a completion or a rework loop-back is a
//! recharge of the routing tail rather than a reconstruction.

use crate::fixed::{Duration, Fixed64};
use crate::id::{JobId, ServerId};
use crate::job::Job;
use crate::policies::WipStrategy;
use slotmap::SecondaryMap;

/// Per-server WIP under a [`WipStrategy`].
#[derive(Debug)]
pub struct WipTracker {
    strategy: WipStrategy,
    wip: SecondaryMap<ServerId, Fixed64>,
    /// What each job currently charges per routing index.
    charged: SecondaryMap<JobId, Vec<Fixed64>>,
    peak_total: Fixed64,
}

impl WipTracker {
    pub fn new(strategy: WipStrategy) -> Self {
        Self {
            strategy,
            wip: SecondaryMap::new(),
            charged: SecondaryMap::new(),
            peak_total: Fixed64::ZERO,
        }
    }

    pub fn register_server(&mut self, server: ServerId) {
        self.wip.insert(server, Fixed64::ZERO);
    }

    /// The charge of a processing time `distance` operations ahead of the
    /// job's current position.
    fn contribution(&self, p: Duration, distance: usize) -> Fixed64 {
        match self.strategy {
            WipStrategy::Standard => p,
            WipStrategy::Corrected => p / Fixed64::from_num(distance as i64 + 1),
        }
    }

    /// What releasing this job right now would add to each routed server.
    /// Servers visited twice appear twice.
    pub fn release_contributions(&self, job: &Job) -> Vec<(ServerId, Fixed64)> {
        job.operations
            .iter()
            .enumerate()
            .map(|(k, op)| (op.server, self.contribution(op.processing_time, k)))
            .collect()
    }

    /// Charge a job entering the shop floor.
    pub fn charge_release(&mut self, id: JobId, job: &Job) {
        self.charged.insert(id, vec![Fixed64::ZERO; job.operations.len()]);
        self.recharge_tail(id, job, 0);
    }

    /// Settle a completed operation: its charge leaves the server and the
    /// remaining tail is promoted one position closer.
    pub fn settle_completion(&mut self, id: JobId, job: &Job, completed: usize) {
        if let Some(charges) = self.charged.get_mut(id) {
            let server = job.operations[completed].server;
            let amount = std::mem::take(&mut charges[completed]);
            if let Some(w) = self.wip.get_mut(server) {
                *w -= amount;
            }
        }
        self.recharge_tail(id, job, completed + 1);
    }

    /// Re-base the tail after a rework loop-back: the re-done segment is
    /// charged again as if the job had just arrived at `loopback`.
    pub fn charge_rework(&mut self, id: JobId, job: &Job, loopback: usize) {
        self.recharge_tail(id, job, loopback);
    }

    /// Drop a finished (or withdrawn) job's bookkeeping.
    pub fn forget(&mut self, id: JobId) {
        self.charged.remove(id);
    }

    /// Set the charge of every operation at or past `current` to its
    /// contribution relative to `current`.
    fn recharge_tail(&mut self, id: JobId, job: &Job, current: usize) {
        let Some(charges) = self.charged.get_mut(id) else {
            return;
        };
        let mut deltas: Vec<(ServerId, Fixed64)> = Vec::new();
        let strategy = self.strategy;
        for (k, op) in job.operations.iter().enumerate().skip(current) {
            let target = match strategy {
                WipStrategy::Standard => op.processing_time,
                WipStrategy::Corrected => {
                    op.processing_time / Fixed64::from_num((k - current) as i64 + 1)
                }
            };
            let delta = target - charges[k];
            charges[k] = target;
            if delta != Fixed64::ZERO {
                deltas.push((op.server, delta));
            }
        }
        for (server, delta) in deltas {
            if let Some(w) = self.wip.get_mut(server) {
                *w += delta;
            }
        }
        let total = self.total();
        if total > self.peak_total {
            self.peak_total = total;
        }
    }

    pub fn wip_of(&self, server: ServerId) -> Fixed64 {
        self.wip.get(server).copied().unwrap_or(Fixed64::ZERO)
    }

    pub fn total(&self) -> Fixed64 {
        self.wip.values().fold(Fixed64::ZERO, |acc, w| acc + *w)
    }

    pub fn peak_total(&self) -> Fixed64 {
        self.peak_total
    }
}

// ===========================================================================
// Tests
// ===========================================================================
