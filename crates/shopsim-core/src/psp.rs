//! Pre-shop pool and release decisions.
//!
//! Jobs wait here until a [`ReleasePolicy`] admits them to the floor. The
//! pool itself is a plain arrival-ordered backlog; the policy procedures
//! are pure functions over the pool, the job records, the servers, and the
//! WIP tracker. They return a [`ReleasePlan`] and the engine performs the
//! side effects, so the decision logic never holds a mutable borrow of the
//! world it is ranking.
//!
//! Three non-trivial policies:
//!
//! - Workload norms: periodic. Candidates are walked in planned-release-date
//!   order and admitted while every routed server's projected WIP stays
//!   under its norm. A continuous trigger also fires on every operation
//!   completion: a starving server pulls its earliest-planned candidate in,
//!   norms notwithstanding.
//! - Slack-driven: on every operation completion. A starving or near-empty
//!   server pulls the least-slack candidate bound for it. Otherwise, when
//!   nobody waiting at the server is urgent, an urgent pool job with the
//!   quickest first operation is released and the queue is re-sorted by
//!   planned slack (waiting requests only).
//! - Scored: on every operation completion. Pool candidates pass a
//!   projected-WIP gate and a first-server authorization check; jobs already
//!   queued at the triggering server compete without re-passing admission.
//!   The best weighted score of processing speed, starvation response, slack
//!   urgency, and release pacing wins: a pool winner is released, a queued
//!   winner has its queue re-sorted under the persisted-priority rule. The
//!   winning score is persisted as the job's dispatch priority either way.

use crate::fixed::{Duration, Fixed64, SimTime};
use crate::id::{JobId, ServerId};
use crate::job::Job;
use crate::policies::{PriorityRule, ReleasePolicy, ScoreWeights};
use crate::server::Server;
use crate::wip::WipTracker;
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// What a release decision wants done. Jobs are released in order.
#[derive(Debug, Default, PartialEq)]
pub struct ReleasePlan {
    pub release: Vec<JobId>,
    /// Queues to re-key under the given rule after the releases land.
    pub escalate: Vec<(ServerId, PriorityRule)>,
    /// Priorities to persist on jobs before they enqueue.
    pub persist_priority: Vec<(JobId, Fixed64)>,
}

impl ReleasePlan {
    pub fn is_empty(&self) -> bool {
        self.release.is_empty() && self.escalate.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// The arrival-ordered backlog of jobs not yet admitted to the floor.
#[derive(Debug, Default)]
pub struct PreShopPool {
    jobs: Vec<JobId>,
}

impl PreShopPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: JobId) {
        self.jobs.push(job);
    }

    /// Remove a released job. No-op if it is not pooled.
    pub fn take(&mut self, job: JobId) {
        self.jobs.retain(|&j| j != job);
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.jobs.contains(&job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.iter().copied()
    }

    // -----------------------------------------------------------------------
    // Decision procedures
    // -----------------------------------------------------------------------

    /// Should a job just arrived in the pool be released right away?
    /// True for the immediate baseline and for the composable starvation
    /// avoidance (first server has an empty queue and a free slot).
    pub fn release_on_arrival(
        &self,
        policy: &ReleasePolicy,
        starvation_avoidance: bool,
        job: &Job,
        servers: &SlotMap<ServerId, Server>,
    ) -> bool {
        if matches!(policy, ReleasePolicy::Immediate) {
            return true;
        }
        if !starvation_avoidance {
            return false;
        }
        job.first_server()
            .and_then(|s| servers.get(s))
            .map(|s| s.is_starving())
            .unwrap_or(false)
    }

    /// Periodic workload-norm check.
    pub fn on_periodic_check(
        &self,
        policy: &ReleasePolicy,
        jobs: &SlotMap<JobId, Job>,
        wip: &WipTracker,
    ) -> ReleasePlan {
        let ReleasePolicy::WorkloadNorm {
            norms, allowance, ..
        } = policy
        else {
            return ReleasePlan::default();
        };

        let mut candidates: Vec<JobId> = self.jobs.clone();
        candidates.sort_by_key(|&id| jobs[id].planned_release_date(*allowance));

        let mut plan = ReleasePlan::default();
        // Admissions within one check load the gate for the next candidate.
        let mut pending: SecondaryMap<ServerId, Fixed64> = SecondaryMap::new();

        for id in candidates {
            let contributions = wip.release_contributions(&jobs[id]);
            let fits = contributions.iter().all(|&(server, add)| {
                let Some(norm) = norms.get(server) else {
                    return true;
                };
                let projected = wip.wip_of(server)
                    + pending.get(server).copied().unwrap_or(Fixed64::ZERO)
                    + add;
                projected <= *norm
            });
            if fits {
                for (server, add) in contributions {
                    if let Some(p) = pending.get_mut(server) {
                        *p += add;
                    } else {
                        pending.insert(server, add);
                    }
                }
                plan.release.push(id);
            }
        }
        plan
    }

    /// Event-driven check on every operation completion at `server_id`.
    pub fn on_processing_end(
        &self,
        policy: &ReleasePolicy,
        server_id: ServerId,
        jobs: &SlotMap<JobId, Job>,
        servers: &SlotMap<ServerId, Server>,
        wip: &WipTracker,
        now: SimTime,
        released_count: u64,
    ) -> ReleasePlan {
        match policy {
            ReleasePolicy::WorkloadNorm { allowance, .. } => {
                self.pull_for_starving_server(server_id, jobs, servers, *allowance)
            }
            ReleasePolicy::SlackDriven { allowance } => {
                self.slack_driven(server_id, jobs, servers, now, *allowance)
            }
            ReleasePolicy::Scored {
                weights,
                norms,
                authorization_limit,
                target_release_rate,
                allowance,
            } => self.scored(
                server_id,
                jobs,
                servers,
                wip,
                now,
                released_count,
                weights,
                norms,
                *authorization_limit,
                *target_release_rate,
                *allowance,
            ),
            ReleasePolicy::Immediate => ReleasePlan::default(),
        }
    }

    /// Continuous workload-norm trigger: a starving server pulls in its
    /// earliest-planned candidate, bypassing the norms.
    fn pull_for_starving_server(
        &self,
        server_id: ServerId,
        jobs: &SlotMap<JobId, Job>,
        servers: &SlotMap<ServerId, Server>,
        allowance: Duration,
    ) -> ReleasePlan {
        let mut plan = ReleasePlan::default();
        let Some(server) = servers.get(server_id) else {
            return plan;
        };
        if !server.is_starving() {
            return plan;
        }
        let candidate = self
            .jobs
            .iter()
            .copied()
            .filter(|&id| jobs[id].first_server() == Some(server_id))
            .min_by_key(|&id| jobs[id].planned_release_date(allowance));
        plan.release.extend(candidate);
        plan
    }

    fn slack_driven(
        &self,
        server_id: ServerId,
        jobs: &SlotMap<JobId, Job>,
        servers: &SlotMap<ServerId, Server>,
        now: SimTime,
        allowance: Duration,
    ) -> ReleasePlan {
        let mut plan = ReleasePlan::default();
        let Some(server) = servers.get(server_id) else {
            return plan;
        };

        if server.queue_len() <= 1 {
            // The server is about to starve: pull the least-slack candidate
            // that starts here.
            let candidate = self
                .jobs
                .iter()
                .copied()
                .filter(|&id| jobs[id].first_server() == Some(server_id))
                .min_by_key(|&id| jobs[id].planned_slack_time(now, allowance));
            plan.release.extend(candidate);
            return plan;
        }

        // Everyone already waiting is comfortable; an urgent pool job may
        // jump in and escalate the queue order.
        let all_waiting_comfortable = server
            .queued_jobs()
            .all(|id| jobs[id].planned_slack_time(now, allowance) > Duration::ZERO);
        if !all_waiting_comfortable {
            return plan;
        }

        let urgent = self
            .jobs
            .iter()
            .copied()
            .filter(|&id| jobs[id].planned_slack_time(now, allowance) < Duration::ZERO)
            .min_by_key(|&id| jobs[id].first_remaining_processing_time());
        if let Some(id) = urgent {
            if let Some(first) = jobs[id].first_server() {
                plan.escalate
                    .push((first, PriorityRule::PlannedSlack { allowance }));
            }
            plan.release.push(id);
        }
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn scored(
        &self,
        server_id: ServerId,
        jobs: &SlotMap<JobId, Job>,
        servers: &SlotMap<ServerId, Server>,
        wip: &WipTracker,
        now: SimTime,
        released_count: u64,
        weights: &ScoreWeights,
        norms: &SecondaryMap<ServerId, Fixed64>,
        authorization_limit: usize,
        target_release_rate: Fixed64,
        allowance: Duration,
    ) -> ReleasePlan {
        let mut plan = ReleasePlan::default();
        let one = Fixed64::from_num(1);

        // Pacing is the same for every candidate at one instant: how far
        // actual releases lag the target.
        let pace = target_release_rate * now - Fixed64::from_num(released_count as i64);

        // The winner may come from the pool (a release) or from the queue
        // at the triggering server (a re-dispatch).
        let mut best: Option<(JobId, Fixed64, bool)> = None;
        for id in self.jobs.iter().copied() {
            let job = &jobs[id];
            let Some(first) = job.first_server() else {
                continue;
            };

            // Gate 1: projected WIP within norms on every routed server.
            let fits = wip.release_contributions(job).iter().all(|&(server, add)| {
                norms
                    .get(server)
                    .map(|&norm| wip.wip_of(server) + add <= norm)
                    .unwrap_or(true)
            });
            if !fits {
                continue;
            }

            // Gate 2: the first server authorizes a new arrival.
            let first_queue = servers.get(first).map(|s| s.queue_len()).unwrap_or(0);
            if first_queue > authorization_limit {
                continue;
            }

            let spt = one / (one + job.first_remaining_processing_time());
            let starvation = one / (one + Fixed64::from_num(first_queue as i64));
            let slack = -job.planned_slack_time(now, allowance);
            let score = weights.spt * spt
                + weights.starvation * starvation
                + weights.slack * slack
                + weights.pace * pace;

            // Strictly greater keeps arrival order on ties.
            if best.map(|(_, s, _)| score > s).unwrap_or(true) {
                best = Some((id, score, false));
            }
        }

        // Jobs already waiting at the triggering server compete on the same
        // score. They passed admission when they were released, so the pool
        // gates do not re-apply.
        if let Some(server) = servers.get(server_id) {
            let queue_len = Fixed64::from_num(server.queue_len() as i64);
            for id in server.queued_jobs() {
                let Some(job) = jobs.get(id) else {
                    continue;
                };
                let spt = one / (one + job.first_remaining_processing_time());
                let starvation = one / (one + queue_len);
                let slack = -job.planned_slack_time(now, allowance);
                let score = weights.spt * spt
                    + weights.starvation * starvation
                    + weights.slack * slack
                    + weights.pace * pace;
                if best.map(|(_, s, _)| score > s).unwrap_or(true) {
                    best = Some((id, score, true));
                }
            }
        }

        if let Some((id, score, queued)) = best {
            plan.persist_priority.push((id, score));
            if queued {
                plan.escalate.push((server_id, PriorityRule::Persisted));
            } else {
                plan.release.push(id);
            }
        }
        plan
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::id::FamilyId;
    use crate::job::{JobSpec, OperationSpec};
    use crate::policies::WipStrategy;
    use crate::server::ServerKind;

    struct World {
        jobs: SlotMap<JobId, Job>,
        servers: SlotMap<ServerId, Server>,
        wip: WipTracker,
        pool: PreShopPool,
    }

    impl World {
        fn new(server_count: usize) -> Self {
            let mut servers = SlotMap::with_key();
            let mut wip = WipTracker::new(WipStrategy::Corrected);
            for i in 0..server_count {
                let id = servers.insert(Server::new(format!("m{i}"), 1, ServerKind::Standard));
                wip.register_server(id);
            }
            Self {
                jobs: SlotMap::with_key(),
                servers,
                wip,
                pool: PreShopPool::new(),
            }
        }

        fn server_ids(&self) -> Vec<ServerId> {
            self.servers.keys().collect()
        }

        fn pool_job(&mut self, route: &[(usize, f64)], due: f64) -> JobId {
            let ids = self.server_ids();
            let ops = route
                .iter()
                .map(|&(s, p)| OperationSpec::new(ids[s], f64_to_fixed64(p)))
                .collect();
            let spec = JobSpec::new(FamilyId(0), ops, f64_to_fixed64(due));
            let id = self.jobs.insert(Job::from_spec(spec, f64_to_fixed64(0.0)));
            self.pool.push(id);
            id
        }
    }

    fn norm_policy(norms: &[(ServerId, f64)], allowance: f64) -> ReleasePolicy {
        let mut map = SecondaryMap::new();
        for &(s, n) in norms {
            map.insert(s, f64_to_fixed64(n));
        }
        ReleasePolicy::WorkloadNorm {
            norms: map,
            allowance: f64_to_fixed64(allowance),
            check_interval: f64_to_fixed64(4.0),
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Pool keeps arrival order and removes released jobs
    // -----------------------------------------------------------------------
    #[test]
    fn pool_order_and_take() {
        let mut w = World::new(1);
        let a = w.pool_job(&[(0, 1.0)], 10.0);
        let b = w.pool_job(&[(0, 1.0)], 20.0);

        assert_eq!(w.pool.len(), 2);
        assert!(w.pool.contains(a));

        w.pool.take(a);
        assert_eq!(w.pool.iter().collect::<Vec<_>>(), vec![b]);
        // Removing again is harmless.
        w.pool.take(a);
        assert_eq!(w.pool.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 2: Workload gate blocks a release that would breach a norm
    // -----------------------------------------------------------------------
    #[test]
    fn workload_gate_blocks_breach() {
        let mut w = World::new(2);
        let ids = w.server_ids();
        // Candidate charges 6 at server 0 and 2 at server 1.
        let job = w.pool_job(&[(0, 6.0), (1, 4.0)], 100.0);

        let tight = norm_policy(&[(ids[0], 5.0), (ids[1], 10.0)], 1.0);
        let plan = w.pool.on_periodic_check(&tight, &w.jobs, &w.wip);
        assert!(plan.release.is_empty());

        let loose = norm_policy(&[(ids[0], 8.0), (ids[1], 10.0)], 1.0);
        let plan = w.pool.on_periodic_check(&loose, &w.jobs, &w.wip);
        assert_eq!(plan.release, vec![job]);
    }

    // -----------------------------------------------------------------------
    // Test 3: Admissions within one check load the gate
    // -----------------------------------------------------------------------
    #[test]
    fn admissions_within_check_accumulate() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        // Each charges 4; the norm fits two but not three.
        let a = w.pool_job(&[(0, 4.0)], 50.0);
        let b = w.pool_job(&[(0, 4.0)], 60.0);
        let _c = w.pool_job(&[(0, 4.0)], 70.0);

        let policy = norm_policy(&[(ids[0], 8.0)], 1.0);
        let plan = w.pool.on_periodic_check(&policy, &w.jobs, &w.wip);
        // Walked in planned-release order: earliest due dates first.
        assert_eq!(plan.release, vec![a, b]);
    }

    // -----------------------------------------------------------------------
    // Test 4: Candidates are walked by planned release date
    // -----------------------------------------------------------------------
    #[test]
    fn candidates_by_planned_release_date() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let late = w.pool_job(&[(0, 4.0)], 90.0);
        let soon = w.pool_job(&[(0, 4.0)], 20.0);

        // Norm admits one.
        let policy = norm_policy(&[(ids[0], 4.0)], 1.0);
        let plan = w.pool.on_periodic_check(&policy, &w.jobs, &w.wip);
        assert_eq!(plan.release, vec![soon]);
        assert_ne!(plan.release, vec![late]);
    }

    // -----------------------------------------------------------------------
    // Test 5: Starving server pulls a candidate past the norms
    // -----------------------------------------------------------------------
    #[test]
    fn starving_server_pulls_past_norms() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let job = w.pool_job(&[(0, 6.0)], 100.0);

        // Norm of zero would never admit through the periodic gate.
        let policy = norm_policy(&[(ids[0], 0.0)], 1.0);
        let plan = w.pool.on_processing_end(
            &policy,
            ids[0],
            &w.jobs,
            &w.servers,
            &w.wip,
            f64_to_fixed64(10.0),
            0,
        );
        assert_eq!(plan.release, vec![job]);
    }

    // -----------------------------------------------------------------------
    // Test 6: Slack-driven pull on a near-empty server
    // -----------------------------------------------------------------------
    #[test]
    fn slack_driven_pulls_least_slack() {
        let mut w = World::new(2);
        let ids = w.server_ids();
        let comfortable = w.pool_job(&[(0, 2.0)], 100.0);
        let urgent = w.pool_job(&[(0, 2.0)], 12.0);
        let elsewhere = w.pool_job(&[(1, 2.0)], 5.0);
        let _ = (comfortable, elsewhere);

        let policy = ReleasePolicy::SlackDriven {
            allowance: f64_to_fixed64(1.0),
        };
        let plan = w.pool.on_processing_end(
            &policy,
            ids[0],
            &w.jobs,
            &w.servers,
            &w.wip,
            f64_to_fixed64(10.0),
            0,
        );
        // Only jobs starting at the starving server are considered.
        assert_eq!(plan.release, vec![urgent]);
        assert!(plan.escalate.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 7: Slack-driven escalation when waiters are comfortable
    // -----------------------------------------------------------------------
    #[test]
    fn slack_driven_escalates_urgent_pool_job() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let now = f64_to_fixed64(10.0);
        let allowance = f64_to_fixed64(1.0);

        // Two comfortable jobs already waiting at the server.
        for due in [100.0, 120.0] {
            let id = w.pool_job(&[(0, 2.0)], due);
            w.pool.take(id);
            w.jobs[id].state = crate::job::JobState::Queued { op: 0 };
            w.servers[ids[0]].enqueue(id, Fixed64::ZERO, now);
        }

        // Urgent pool jobs; the quicker first operation wins.
        let slow_urgent = w.pool_job(&[(0, 5.0)], 11.0);
        let fast_urgent = w.pool_job(&[(0, 2.0)], 11.0);
        let _ = slow_urgent;

        let policy = ReleasePolicy::SlackDriven { allowance };
        let plan = w
            .pool
            .on_processing_end(&policy, ids[0], &w.jobs, &w.servers, &w.wip, now, 0);

        assert_eq!(plan.release, vec![fast_urgent]);
        assert_eq!(
            plan.escalate,
            vec![(ids[0], PriorityRule::PlannedSlack { allowance })]
        );
    }

    // -----------------------------------------------------------------------
    // Test 8: Slack-driven stays quiet when an urgent job already waits
    // -----------------------------------------------------------------------
    #[test]
    fn slack_driven_quiet_when_queue_has_urgency() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let now = f64_to_fixed64(10.0);

        // One comfortable, one urgent waiter.
        for due in [100.0, 11.0] {
            let id = w.pool_job(&[(0, 2.0)], due);
            w.pool.take(id);
            w.servers[ids[0]].enqueue(id, Fixed64::ZERO, now);
        }
        let _pooled = w.pool_job(&[(0, 2.0)], 11.0);

        let policy = ReleasePolicy::SlackDriven {
            allowance: f64_to_fixed64(1.0),
        };
        let plan = w
            .pool
            .on_processing_end(&policy, ids[0], &w.jobs, &w.servers, &w.wip, now, 0);
        assert!(plan.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 9: Scored release persists the winning score
    // -----------------------------------------------------------------------
    #[test]
    fn scored_release_persists_priority() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        // The quick job scores higher on the SPT term; slack terms tie.
        let quick = w.pool_job(&[(0, 1.0)], 50.0);
        let slow = w.pool_job(&[(0, 9.0)], 50.0);
        let _ = slow;

        let policy = ReleasePolicy::Scored {
            weights: ScoreWeights {
                spt: f64_to_fixed64(1.0),
                starvation: Fixed64::ZERO,
                slack: Fixed64::ZERO,
                pace: Fixed64::ZERO,
            },
            norms: SecondaryMap::new(),
            authorization_limit: 3,
            target_release_rate: f64_to_fixed64(0.1),
            allowance: f64_to_fixed64(1.0),
        };
        let plan = w.pool.on_processing_end(
            &policy,
            ids[0],
            &w.jobs,
            &w.servers,
            &w.wip,
            f64_to_fixed64(10.0),
            0,
        );

        assert_eq!(plan.release, vec![quick]);
        assert_eq!(plan.persist_priority.len(), 1);
        assert_eq!(plan.persist_priority[0].0, quick);
        assert_eq!(plan.persist_priority[0].1, f64_to_fixed64(0.5));
    }

    // -----------------------------------------------------------------------
    // Test 10: Scored dispatch lets a queued job out-score the pool
    // -----------------------------------------------------------------------
    #[test]
    fn scored_queued_candidate_wins_and_escalates() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let now = f64_to_fixed64(0.0);

        // A quick job already waits at the server; the pool only offers a
        // slow one.
        let waiting = w.pool_job(&[(0, 1.0)], 100.0);
        w.pool.take(waiting);
        w.jobs[waiting].state = crate::job::JobState::Queued { op: 0 };
        w.servers[ids[0]].enqueue(waiting, Fixed64::ZERO, now);
        let _pooled = w.pool_job(&[(0, 9.0)], 100.0);

        let policy = ReleasePolicy::Scored {
            weights: ScoreWeights {
                spt: f64_to_fixed64(1.0),
                starvation: Fixed64::ZERO,
                slack: Fixed64::ZERO,
                pace: Fixed64::ZERO,
            },
            norms: SecondaryMap::new(),
            authorization_limit: 3,
            target_release_rate: f64_to_fixed64(0.1),
            allowance: f64_to_fixed64(1.0),
        };
        let plan = w
            .pool
            .on_processing_end(&policy, ids[0], &w.jobs, &w.servers, &w.wip, now, 0);

        // The waiter's 1/(1+1) beats the pool job's 1/(1+9): nothing is
        // released, the queue is re-keyed from the persisted score.
        assert!(plan.release.is_empty());
        assert_eq!(plan.escalate, vec![(ids[0], PriorityRule::Persisted)]);
        assert_eq!(plan.persist_priority, vec![(waiting, f64_to_fixed64(0.5))]);
    }

    // -----------------------------------------------------------------------
    // Test 11: Scored authorization limit blocks a crowded first server
    // -----------------------------------------------------------------------
    #[test]
    fn scored_authorization_limit() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let now = f64_to_fixed64(0.0);

        for _ in 0..3 {
            let id = w.pool_job(&[(0, 1.0)], 100.0);
            w.pool.take(id);
            w.servers[ids[0]].enqueue(id, Fixed64::ZERO, now);
        }
        let _candidate = w.pool_job(&[(0, 1.0)], 100.0);

        let policy = ReleasePolicy::Scored {
            weights: ScoreWeights::default(),
            norms: SecondaryMap::new(),
            authorization_limit: 2,
            target_release_rate: f64_to_fixed64(0.1),
            allowance: f64_to_fixed64(1.0),
        };
        let plan = w
            .pool
            .on_processing_end(&policy, ids[0], &w.jobs, &w.servers, &w.wip, now, 0);
        assert!(plan.release.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 12: Starvation avoidance releases an arrival for an idle server
    // -----------------------------------------------------------------------
    #[test]
    fn starvation_avoidance_on_arrival() {
        let mut w = World::new(1);
        let ids = w.server_ids();
        let job = w.pool_job(&[(0, 1.0)], 100.0);

        let policy = ReleasePolicy::SlackDriven {
            allowance: f64_to_fixed64(1.0),
        };

        assert!(w
            .pool
            .release_on_arrival(&policy, true, &w.jobs[job], &w.servers));
        assert!(!w
            .pool
            .release_on_arrival(&policy, false, &w.jobs[job], &w.servers));

        // A busy first server suppresses the bypass.
        let waiter = w.pool_job(&[(0, 1.0)], 100.0);
        w.pool.take(waiter);
        w.servers[ids[0]].enqueue(waiter, Fixed64::ZERO, f64_to_fixed64(0.0));
        assert!(!w
            .pool
            .release_on_arrival(&policy, true, &w.jobs[job], &w.servers));
    }

    // -----------------------------------------------------------------------
    // Test 13: Immediate policy always releases on arrival
    // -----------------------------------------------------------------------
    #[test]
    fn immediate_releases_on_arrival() {
        let mut w = World::new(1);
        let job = w.pool_job(&[(0, 1.0)], 100.0);
        assert!(w.pool.release_on_arrival(
            &ReleasePolicy::Immediate,
            false,
            &w.jobs[job],
            &w.servers
        ));
    }
}
