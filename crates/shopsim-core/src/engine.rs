//! The simulation engine: one instance per run, no globals.
//!
//! The engine owns the clock, the RNG, every registry, the pool, the floor
//! state, and the event bus, so independent instances can run on separate
//! threads without coordination. All behavior is driven from `run`: wakes
//! pop off the clock in `(time, sequence)` order and each handler advances
//! job state machines, grants server slots, and schedules follow-up wakes.
//!
//! Jobs never block a thread. A job that would wait (for a server slot, a
//! bay, stock, or a vehicle) is parked in the owning resource's queue and
//! resumed by the handler that frees it.

use crate::agv::{Agv, Mission};
use crate::clock::{Clock, Wake};
use crate::event::{Event, EventBus};
use crate::fixed::{Duration, Fixed64, SimTime};
use crate::id::*;
use crate::job::{Job, JobSpec, JobState, OpRecord};
use crate::materials::{self, MaterialPhase};
use crate::policies::{AgvSelection, ReleasePolicy, StoreSelection, WipStrategy};
use crate::psp::{PreShopPool, ReleasePlan};
use crate::rng::SimRng;
use crate::server::{Server, ServerKind};
use crate::shopfloor::{CompletedJob, FlowEmas, ShopFloor};
use crate::store::{Store, StockWait};
use crate::validation::{validate_spec, BuildError, RunError};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Job sources
// ---------------------------------------------------------------------------

/// An injected producer of jobs. The engine pulls it once at time zero and
/// then again after every returned gap until it returns `None`.
pub trait JobSource {
    fn next_job(&mut self, now: SimTime, rng: &mut SimRng) -> Option<(JobSpec, Duration)>;
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Everything `ShopBuilder::build` validated, ready to become an engine.
pub(crate) struct EngineSeed {
    pub seed: u64,
    pub servers: SlotMap<ServerId, Server>,
    pub stores: SlotMap<StoreId, Store>,
    pub agvs: SlotMap<AgvId, Agv>,
    pub policy: ReleasePolicy,
    pub starvation_avoidance: bool,
    pub agv_selection: AgvSelection,
    pub store_selection: StoreSelection,
    pub wip_strategy: WipStrategy,
    pub ema_alpha: Fixed64,
    pub due_window: Duration,
    pub event_capacity: usize,
    pub arrivals: Vec<(SimTime, JobSpec)>,
    pub source: Option<Box<dyn JobSource>>,
}

/// One simulation run.
pub struct Engine {
    clock: Clock,
    rng: SimRng,
    jobs: SlotMap<JobId, Job>,
    servers: SlotMap<ServerId, Server>,
    stores: SlotMap<StoreId, Store>,
    agvs: SlotMap<AgvId, Agv>,
    pool: PreShopPool,
    floor: ShopFloor,
    policy: ReleasePolicy,
    starvation_avoidance: bool,
    agv_selection: AgvSelection,
    store_selection: StoreSelection,
    bus: EventBus,
    source: Option<Box<dyn JobSource>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    pub(crate) fn from_seed(seed: EngineSeed) -> Self {
        let mut floor = ShopFloor::new(seed.wip_strategy, seed.ema_alpha, seed.due_window);
        for server in seed.servers.keys() {
            floor.wip_mut().register_server(server);
        }

        let mut engine = Self {
            clock: Clock::new(),
            rng: SimRng::new(seed.seed),
            jobs: SlotMap::with_key(),
            servers: seed.servers,
            stores: seed.stores,
            agvs: seed.agvs,
            pool: PreShopPool::new(),
            floor,
            policy: seed.policy,
            starvation_avoidance: seed.starvation_avoidance,
            agv_selection: seed.agv_selection,
            store_selection: seed.store_selection,
            bus: EventBus::new(seed.event_capacity),
            source: seed.source,
        };

        for (at, spec) in seed.arrivals {
            let id = engine.jobs.insert(Job::from_spec(spec, at));
            engine.jobs[id].state = JobState::Scheduled;
            engine.clock.schedule(at, Wake::Arrival { job: id });
        }

        // Arm the first failure of every faulty server.
        let failures: Vec<(ServerId, Duration)> = engine
            .servers
            .iter()
            .filter_map(|(id, server)| match &server.kind {
                ServerKind::Faulty {
                    time_between_failures,
                    ..
                } => Some((id, time_between_failures.clone())),
                _ => None,
            })
            .map(|(id, sample)| (id, sample.draw(&mut engine.rng)))
            .collect();
        for (server, ttf) in failures {
            engine.clock.schedule_after(ttf, Wake::Breakdown { server });
        }

        if let Some(interval) = engine.policy.check_interval() {
            engine.clock.schedule_after(interval, Wake::PspCheck);
        }
        if engine.source.is_some() {
            engine.clock.schedule(SimTime::ZERO, Wake::SourcePull);
        }

        engine
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Advance the run up to and including `until`. Idempotent continuation:
    /// call again with a larger bound to keep going.
    pub fn run(&mut self, until: SimTime) -> Result<SimTime, RunError> {
        loop {
            if self.clock.is_interrupted() {
                return Err(RunError::Halted {
                    at: self.clock.now(),
                });
            }
            let prev = self.clock.now();
            let Some((at, wake)) = self.clock.pop_next_before(until) else {
                break;
            };
            // Listeners see all events of one instant before time moves on.
            if at > prev {
                self.bus.deliver();
            }
            self.dispatch(wake)?;
        }
        self.clock.advance_to(until);
        self.bus.deliver();
        Ok(self.clock.now())
    }

    /// Abort the run at the next loop iteration. Sticky.
    pub fn interrupt(&mut self) {
        self.clock.interrupt();
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Producers
    // -----------------------------------------------------------------------

    /// Hand a job to the pool right now. Released immediately when the
    /// policy says so.
    pub fn submit(&mut self, spec: JobSpec) -> Result<JobId, BuildError> {
        validate_spec(&spec, &self.servers, &self.stores, &self.agvs)?;
        let now = self.clock.now();
        let id = self.jobs.insert(Job::from_spec(spec, now));
        self.admit_to_pool(id);
        Ok(id)
    }

    /// Register a job that arrives later.
    pub fn schedule_arrival(&mut self, at: SimTime, spec: JobSpec) -> Result<JobId, BuildError> {
        validate_spec(&spec, &self.servers, &self.stores, &self.agvs)?;
        let at = at.max(self.clock.now());
        let id = self.jobs.insert(Job::from_spec(spec, at));
        self.jobs[id].state = JobState::Scheduled;
        self.clock.schedule(at, Wake::Arrival { job: id });
        Ok(id)
    }

    /// Replenish a store now. The stock lands after the sampled put time.
    pub fn deposit(
        &mut self,
        store: StoreId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), BuildError> {
        let at = self.clock.now();
        self.schedule_deposit(at, store, product, quantity)
    }

    /// Replenish a store at a future instant.
    pub fn schedule_deposit(
        &mut self,
        at: SimTime,
        store: StoreId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), BuildError> {
        let Some(record) = self.stores.get(store) else {
            return Err(BuildError::UnknownStore);
        };
        let put = record.put_time.draw(&mut self.rng);
        self.clock.schedule(
            at.max(self.clock.now()) + put,
            Wake::PutDone {
                store,
                product,
                quantity,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, wake: Wake) -> Result<(), RunError> {
        match wake {
            Wake::Arrival { job } => self.handle_arrival(job),
            Wake::SourcePull => self.handle_source_pull()?,
            Wake::PspCheck => self.handle_psp_check(),
            Wake::ProcessingDone { job, epoch } => self.handle_processing_done(job, epoch),
            Wake::PickDone { job } => self.handle_pick_done(job),
            Wake::AgvLoadDone { job, agv } => self.handle_agv_load_done(job, agv),
            Wake::AgvTravelDone { job, agv } => self.handle_agv_travel_done(job, agv),
            Wake::AgvUnloadDone { job, agv } => self.handle_agv_unload_done(job, agv),
            Wake::Breakdown { server } => self.handle_breakdown(server),
            Wake::RepairDone { server } => self.handle_repair_done(server),
            Wake::PutDone {
                store,
                product,
                quantity,
            } => self.handle_put_done(store, product, quantity),
        }
        Ok(())
    }

    fn handle_arrival(&mut self, id: JobId) {
        if !self.jobs.contains_key(id) {
            return;
        }
        self.admit_to_pool(id);
    }

    fn admit_to_pool(&mut self, id: JobId) {
        let now = self.clock.now();
        self.jobs[id].state = JobState::Pool;
        self.bus.emit(Event::JobSubmitted { job: id, at: now });
        self.pool.push(id);

        let release = {
            let job = &self.jobs[id];
            self.pool
                .release_on_arrival(&self.policy, self.starvation_avoidance, job, &self.servers)
        };
        if release {
            self.release_job(id);
        }
    }

    fn handle_source_pull(&mut self) -> Result<(), RunError> {
        let now = self.clock.now();
        let produced = match self.source.as_mut() {
            Some(source) => source.next_job(now, &mut self.rng),
            None => None,
        };
        if let Some((spec, gap)) = produced {
            self.submit(spec)?;
            self.clock.schedule_after(gap, Wake::SourcePull);
        }
        Ok(())
    }

    fn handle_psp_check(&mut self) {
        let plan = self
            .pool
            .on_periodic_check(&self.policy, &self.jobs, self.floor.wip());
        self.apply_plan(plan);
        if let Some(interval) = self.policy.check_interval() {
            self.clock.schedule_after(interval, Wake::PspCheck);
        }
    }

    // -----------------------------------------------------------------------
    // Release and queueing
    // -----------------------------------------------------------------------

    fn release_job(&mut self, id: JobId) {
        let now = self.clock.now();
        self.pool.take(id);
        self.jobs[id].released_at = Some(now);

        let job = &self.jobs[id];
        self.floor.on_release(id, job);
        self.bus.emit(Event::JobReleased { job: id, at: now });
        self.enqueue_for_op(id, 0);
    }

    fn enqueue_for_op(&mut self, id: JobId, op: usize) {
        let now = self.clock.now();
        let server_id = self.jobs[id].operations[op].server;
        {
            let job = &mut self.jobs[id];
            job.state = JobState::Queued { op };
            // The loop-back entry consumes a pending rework flag.
            job.rework = false;
            job.op_log.push(OpRecord {
                op,
                server: server_id,
                entered_queue: now,
                started: None,
                completed: None,
            });
        }
        let priority = {
            let job = &self.jobs[id];
            job.priority_rule.priority_of(job, now)
        };
        self.servers[server_id].enqueue(id, priority, now);
        self.pump_server(server_id);
    }

    /// Hand free slots to waiting requests until capacity or the queue runs
    /// out.
    fn pump_server(&mut self, server_id: ServerId) {
        let now = self.clock.now();
        while let Some(granted) = self.servers[server_id].grant_next(now) {
            self.on_granted(granted);
        }
    }

    fn on_granted(&mut self, id: JobId) {
        let Some(op) = self.jobs[id].current_op() else {
            return;
        };
        match self.jobs[id].operations[op].material.clone() {
            Some(need) => self.start_material_flow(id, op, need.product, need.quantity, need.store),
            None => self.start_processing(id, op),
        }
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    fn start_processing(&mut self, id: JobId, op: usize) {
        let now = self.clock.now();
        let server_id = self.jobs[id].operations[op].server;
        let setup = match &self.servers[server_id].setup {
            Some(sample) => sample.draw(&mut self.rng),
            None => Duration::ZERO,
        };
        let hold = self.jobs[id].operations[op].processing_time + setup;

        // A grant can turn into service mid-outage: staged material lands
        // while the server is down. Park the full hold suspended; the
        // repair starts it.
        if self.servers[server_id].is_down() {
            self.jobs[id].state = JobState::Processing {
                op,
                started_at: now,
                hold,
                remaining: hold,
                suspended: true,
            };
            return;
        }

        {
            let job = &mut self.jobs[id];
            job.state = JobState::Processing {
                op,
                started_at: now,
                hold,
                remaining: hold,
                suspended: false,
            };
            if let Some(rec) = job
                .op_log
                .iter_mut()
                .rev()
                .find(|r| r.op == op && r.started.is_none())
            {
                rec.started = Some(now);
            }
        }

        let epoch = self.jobs[id].epoch;
        self.bus.emit(Event::OperationStarted {
            job: id,
            server: server_id,
            op_index: op,
            at: now,
        });
        self.clock
            .schedule_after(hold, Wake::ProcessingDone { job: id, epoch });
    }

    fn handle_processing_done(&mut self, id: JobId, epoch: u32) {
        let Some(job) = self.jobs.get(id) else {
            return;
        };
        let JobState::Processing { op, suspended, .. } = job.state else {
            return;
        };
        // Stale wake: the hold was checkpointed by a breakdown.
        if job.epoch != epoch || suspended {
            return;
        }
        self.complete_operation(id, op);
    }

    fn complete_operation(&mut self, id: JobId, op: usize) {
        let now = self.clock.now();
        let server_id = self.jobs[id].operations[op].server;
        let hold = match self.jobs[id].state {
            JobState::Processing { hold, .. } => hold,
            _ => Duration::ZERO,
        };

        {
            let job = &mut self.jobs[id];
            if let Some(rec) = job
                .op_log
                .iter_mut()
                .rev()
                .find(|r| r.op == op && r.completed.is_none())
            {
                rec.completed = Some(now);
            }
        }
        self.servers[server_id].add_worked_time(hold);
        self.servers[server_id].release(id, now);
        {
            let job = &self.jobs[id];
            self.floor.on_operation_completed(id, job, op);
        }
        self.bus.emit(Event::OperationCompleted {
            job: id,
            server: server_id,
            op_index: op,
            at: now,
        });

        let mut next = op + 1;
        let inspection = match &self.servers[server_id].kind {
            ServerKind::Inspection {
                rework_probability,
                loopback,
            } => Some((*rework_probability, *loopback)),
            _ => None,
        };
        if let Some((probability, loopback)) = inspection {
            if self.rng.chance(probability) {
                self.jobs[id].rework = true;
                {
                    let job = &self.jobs[id];
                    self.floor.on_rework(id, job, loopback);
                }
                self.bus.emit(Event::ReworkTriggered {
                    job: id,
                    server: server_id,
                    loopback,
                    at: now,
                });
                next = loopback;
            }
        }

        if next < self.jobs[id].operations.len() {
            self.enqueue_for_op(id, next);
        } else {
            self.finish_job(id);
        }

        // The freed slot, then the release policies' completion hook.
        self.pump_server(server_id);
        let plan = self.pool.on_processing_end(
            &self.policy,
            server_id,
            &self.jobs,
            &self.servers,
            self.floor.wip(),
            now,
            self.floor.released_count(),
        );
        self.apply_plan(plan);
    }

    fn finish_job(&mut self, id: JobId) {
        let now = self.clock.now();
        {
            let job = &mut self.jobs[id];
            job.state = JobState::Done;
            job.finished_at = Some(now);
        }
        let job = &self.jobs[id];
        self.floor.on_finished(id, job);
        self.bus.emit(Event::JobFinished { job: id, at: now });
    }

    fn apply_plan(&mut self, plan: ReleasePlan) {
        let now = self.clock.now();
        for (id, priority) in plan.persist_priority {
            if let Some(job) = self.jobs.get_mut(id) {
                job.priority = priority;
            }
        }
        for id in plan.release {
            if self.pool.contains(id) {
                self.release_job(id);
            }
        }
        for (server_id, rule) in plan.escalate {
            let jobs = &self.jobs;
            if let Some(server) = self.servers.get_mut(server_id) {
                server.sort_queue(|jid| match jobs.get(jid) {
                    Some(job) => rule.priority_of(job, now),
                    None => Fixed64::ZERO,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Materials
    // -----------------------------------------------------------------------

    fn start_material_flow(
        &mut self,
        id: JobId,
        op: usize,
        product: ProductId,
        quantity: u32,
        pinned: Option<StoreId>,
    ) {
        let store_id = pinned.or_else(|| {
            materials::select_store(self.store_selection, &self.stores, product, quantity)
        });
        let Some(store_id) = store_id else {
            // Validated away at submit time; nothing to stage.
            self.start_processing(id, op);
            return;
        };

        self.jobs[id].state = JobState::Materializing {
            op,
            phase: MaterialPhase::QueuedBay { store: store_id },
        };
        if self.stores[store_id].acquire_bay(id) {
            self.begin_stock_check(id, store_id);
        }
    }

    fn begin_stock_check(&mut self, id: JobId, store_id: StoreId) {
        let now = self.clock.now();
        let Some(op) = self.jobs[id].current_op() else {
            return;
        };
        let Some(need) = self.jobs[id].operations[op].material.clone() else {
            return;
        };

        if self.stores[store_id].try_reserve(need.product, need.quantity) {
            self.start_pick(id, store_id);
        } else {
            let missing = need.quantity - self.stores[store_id].stock_of(need.product);
            self.bus.emit(Event::StockShort {
                store: store_id,
                product: need.product,
                missing,
                at: now,
            });
            self.stores[store_id].push_stock_waiter(StockWait {
                job: id,
                product: need.product,
                quantity: need.quantity,
                since: now,
            });
            self.jobs[id].state = JobState::Materializing {
                op,
                phase: MaterialPhase::AwaitingStock { store: store_id },
            };
        }
    }

    fn start_pick(&mut self, id: JobId, store_id: StoreId) {
        let Some(op) = self.jobs[id].current_op() else {
            return;
        };
        self.jobs[id].state = JobState::Materializing {
            op,
            phase: MaterialPhase::Picking { store: store_id },
        };
        let pick = self.stores[store_id].pick_time.draw(&mut self.rng);
        self.clock.schedule_after(pick, Wake::PickDone { job: id });
    }

    fn handle_pick_done(&mut self, id: JobId) {
        let now = self.clock.now();
        let Some(job) = self.jobs.get(id) else {
            return;
        };
        let JobState::Materializing {
            op,
            phase: MaterialPhase::Picking { store: store_id },
        } = job.state
        else {
            return;
        };
        let Some(need) = self.jobs[id].operations[op].material.clone() else {
            return;
        };

        self.bus.emit(Event::PickCompleted {
            store: store_id,
            job: id,
            product: need.product,
            quantity: need.quantity,
            at: now,
        });

        // The bay frees up for the next withdrawal.
        if let Some(next) = self.stores[store_id].release_bay() {
            self.begin_stock_check(next, store_id);
        }

        let from = self.stores[store_id].location;
        let server_id = self.jobs[id].operations[op].server;
        let to = self.servers[server_id].location;
        let Some(agv_id) = materials::select_agv(self.agv_selection, &self.agvs, from) else {
            return;
        };

        self.agvs[agv_id].push_mission(Mission {
            job: id,
            store: store_id,
            server: server_id,
            from,
            to,
        });
        self.jobs[id].state = JobState::Materializing {
            op,
            phase: MaterialPhase::AwaitingAgv {
                store: store_id,
                agv: agv_id,
            },
        };
        self.pump_agv(agv_id);
    }

    fn pump_agv(&mut self, agv_id: AgvId) {
        let Some(mission) = self.agvs[agv_id].begin_next_mission() else {
            return;
        };
        if let Some(op) = self.jobs[mission.job].current_op() {
            self.jobs[mission.job].state = JobState::Materializing {
                op,
                phase: MaterialPhase::Loading { agv: agv_id },
            };
        }
        let load = self.agvs[agv_id].load_time.draw(&mut self.rng);
        self.clock.schedule_after(
            load,
            Wake::AgvLoadDone {
                job: mission.job,
                agv: agv_id,
            },
        );
    }

    fn handle_agv_load_done(&mut self, id: JobId, agv_id: AgvId) {
        let Some(travel) = self.agvs[agv_id].begin_travel() else {
            return;
        };
        if let Some(op) = self.jobs[id].current_op() {
            self.jobs[id].state = JobState::Materializing {
                op,
                phase: MaterialPhase::Traveling { agv: agv_id },
            };
        }
        self.clock.schedule_after(
            travel,
            Wake::AgvTravelDone {
                job: id,
                agv: agv_id,
            },
        );
    }

    fn handle_agv_travel_done(&mut self, id: JobId, agv_id: AgvId) {
        self.agvs[agv_id].begin_unloading();
        if let Some(op) = self.jobs[id].current_op() {
            self.jobs[id].state = JobState::Materializing {
                op,
                phase: MaterialPhase::Unloading { agv: agv_id },
            };
        }
        let unload = self.agvs[agv_id].unload_time.draw(&mut self.rng);
        self.clock.schedule_after(
            unload,
            Wake::AgvUnloadDone {
                job: id,
                agv: agv_id,
            },
        );
    }

    fn handle_agv_unload_done(&mut self, id: JobId, agv_id: AgvId) {
        let now = self.clock.now();
        let Some(mission) = self.agvs[agv_id].finish_mission() else {
            return;
        };
        self.bus.emit(Event::AgvTripCompleted {
            agv: agv_id,
            job: mission.job,
            at: now,
        });

        // Material stands at the server: the held grant turns into service.
        if let Some(op) = self.jobs[mission.job].current_op() {
            self.start_processing(mission.job, op);
        }
        self.pump_agv(agv_id);
    }

    fn handle_put_done(&mut self, store_id: StoreId, product: ProductId, quantity: u32) {
        let now = self.clock.now();
        let Some(store) = self.stores.get_mut(store_id) else {
            return;
        };
        store.add_stock(product, quantity);
        self.bus.emit(Event::StockDeposited {
            store: store_id,
            product,
            quantity,
            at: now,
        });

        // The deposit may cover several queued withdrawals in order.
        loop {
            let Some(wait) = self.stores[store_id].pop_ready_waiter() else {
                break;
            };
            self.start_pick(wait.job, store_id);
        }
    }

    // -----------------------------------------------------------------------
    // Breakdowns
    // -----------------------------------------------------------------------

    fn handle_breakdown(&mut self, server_id: ServerId) {
        let now = self.clock.now();
        if self.servers[server_id].is_down() {
            return;
        }
        self.servers[server_id].mark_down(now);
        self.bus.emit(Event::ServerDown {
            server: server_id,
            at: now,
        });

        // Checkpoint every running hold.
        let holders: Vec<JobId> = self.servers[server_id].in_service_jobs().to_vec();
        for id in holders {
            let job = &mut self.jobs[id];
            if let JobState::Processing {
                op,
                started_at,
                hold,
                remaining,
                suspended: false,
            } = job.state
            {
                let elapsed = now - started_at;
                job.state = JobState::Processing {
                    op,
                    started_at,
                    hold,
                    remaining: (remaining - elapsed).max(Duration::ZERO),
                    suspended: true,
                };
                job.epoch += 1;
            }
        }

        let repair = match &self.servers[server_id].kind {
            ServerKind::Faulty { repair_time, .. } => repair_time.draw(&mut self.rng),
            _ => Duration::ZERO,
        };
        self.clock
            .schedule_after(repair, Wake::RepairDone { server: server_id });
    }

    fn handle_repair_done(&mut self, server_id: ServerId) {
        let now = self.clock.now();
        self.servers[server_id].mark_repaired(now);
        self.bus.emit(Event::ServerRepaired {
            server: server_id,
            at: now,
        });

        // Resume checkpointed holds with their remainders. A hold parked at
        // grant time has no start on record yet: it begins now.
        let holders: Vec<JobId> = self.servers[server_id].in_service_jobs().to_vec();
        let mut resumed: Vec<(JobId, usize, Duration, u32, bool)> = Vec::new();
        for id in holders {
            let job = &mut self.jobs[id];
            if let JobState::Processing {
                op,
                hold,
                remaining,
                suspended: true,
                ..
            } = job.state
            {
                job.state = JobState::Processing {
                    op,
                    started_at: now,
                    hold,
                    remaining,
                    suspended: false,
                };
                job.epoch += 1;
                let mut fresh = false;
                if let Some(rec) = job
                    .op_log
                    .iter_mut()
                    .rev()
                    .find(|r| r.op == op && r.started.is_none())
                {
                    rec.started = Some(now);
                    fresh = true;
                }
                resumed.push((id, op, remaining, job.epoch, fresh));
            }
        }
        for (id, op, remaining, epoch, fresh) in resumed {
            if fresh {
                self.bus.emit(Event::OperationStarted {
                    job: id,
                    server: server_id,
                    op_index: op,
                    at: now,
                });
            }
            self.clock
                .schedule_after(remaining, Wake::ProcessingDone { job: id, epoch });
        }

        // Arm the next failure only once the server is back up.
        let ttf = match &self.servers[server_id].kind {
            ServerKind::Faulty {
                time_between_failures,
                ..
            } => Some(time_between_failures.draw(&mut self.rng)),
            _ => None,
        };
        if let Some(ttf) = ttf {
            self.clock
                .schedule_after(ttf, Wake::Breakdown { server: server_id });
        }

        self.pump_server(server_id);
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn server(&self, id: ServerId) -> Option<&Server> {
        self.servers.get(id)
    }

    pub fn store(&self, id: StoreId) -> Option<&Store> {
        self.stores.get(id)
    }

    pub fn agv(&self, id: AgvId) -> Option<&Agv> {
        self.agvs.get(id)
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn wip_of(&self, server: ServerId) -> Fixed64 {
        self.floor.wip().wip_of(server)
    }

    pub fn emas(&self) -> &FlowEmas {
        self.floor.emas()
    }

    /// Immutable archive of finished jobs, oldest first.
    pub fn completed(&self) -> &[CompletedJob] {
        self.floor.completed()
    }

    pub fn released_count(&self) -> u64 {
        self.floor.released_count()
    }

    pub fn finished_count(&self) -> u64 {
        self.floor.finished_count()
    }

    pub fn peak_active_jobs(&self) -> usize {
        self.floor.peak_active_jobs()
    }

    pub fn server_utilization(&mut self, id: ServerId) -> Fixed64 {
        let now = self.clock.now();
        self.servers
            .get_mut(id)
            .map(|s| s.utilization_rate(now))
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn server_average_queue_length(&mut self, id: ServerId) -> Fixed64 {
        let now = self.clock.now();
        self.servers
            .get_mut(id)
            .map(|s| s.average_queue_length(now))
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }
}

// ===========================================================================
// Tests
// ===========================================================================
