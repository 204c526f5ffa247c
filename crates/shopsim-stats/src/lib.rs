//! Windowed shop-floor KPIs computed from the core event stream.
//!
//! [`ShopStats`] is a passive consumer: feed it every [`Event`] via
//! [`ShopStats::process_event`] (typically from an
//! [`shopsim_core::event::EventBus`] listener) and close a reporting window
//! with [`ShopStats::end_window`] at whatever simulated-time cadence the
//! caller prefers. All rates are rolling averages over the last
//! `window_size` closed windows plus the one in progress.
//!
//! Nothing here feeds back into the simulation. Removing this crate from a
//! program changes no run outcome.

use fixed::types::I32F32;
use shopsim_core::event::Event;
use shopsim_core::id::{AgvId, JobId, ServerId, StoreId};
use shopsim_core::job::DueDateBand;
use shopsim_core::shopfloor::CompletedJob;
use std::collections::HashMap;

/// Q32.32 fixed-point, matching the simulation's arithmetic.
pub type Fixed64 = I32F32;

/// A point on the logical time axis.
pub type SimTime = Fixed64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for statistics tracking.
#[derive(Debug, Clone, Copy)]
pub struct StatsConfig {
    /// Number of closed windows each rolling rate averages over.
    pub window_size: usize,
    /// Capacity of the per-window history ring buffers.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: 16,
            history_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Ring buffer for history tracking
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer of samples. When full, the oldest sample is
/// overwritten.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Fixed64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            data: vec![Fixed64::ZERO; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: Fixed64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.data.len();
        if self.len < self.data.len() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed sample, if any.
    pub fn latest(&self) -> Option<Fixed64> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.data.len() - 1) % self.data.len();
        Some(self.data[idx])
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Fixed64> + '_ {
        let start = if self.len < self.data.len() {
            0
        } else {
            self.head
        };
        (0..self.len).map(move |i| self.data[(start + i) % self.data.len()])
    }

    pub fn to_vec(&self) -> Vec<Fixed64> {
        self.iter().collect()
    }

    /// Mean of the stored samples, zero when empty.
    pub fn mean(&self) -> Fixed64 {
        if self.len == 0 {
            return Fixed64::ZERO;
        }
        let sum: Fixed64 = self.iter().sum();
        sum / Fixed64::from_num(self.len as u32)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Rolling window
// ---------------------------------------------------------------------------

/// Accumulates a quantity within the current window and averages it over
/// the last `window_size` closed windows.
#[derive(Debug, Clone)]
struct RollingWindow {
    closed: RingBuffer,
    current: Fixed64,
}

impl RollingWindow {
    fn new(window_size: usize) -> Self {
        Self {
            closed: RingBuffer::new(window_size.max(1)),
            current: Fixed64::ZERO,
        }
    }

    fn add(&mut self, amount: Fixed64) {
        self.current += amount;
    }

    fn commit(&mut self) {
        self.closed.push(self.current);
        self.current = Fixed64::ZERO;
    }

    /// Average per window, counting the in-progress window as one
    /// contributor so early readings are not inflated.
    fn rate(&self) -> Fixed64 {
        let sum: Fixed64 = self.closed.iter().sum::<Fixed64>() + self.current;
        let windows = self.closed.len() + 1;
        sum / Fixed64::from_num(windows as u32)
    }

    fn current(&self) -> Fixed64 {
        self.current
    }
}

// ---------------------------------------------------------------------------
// Per-entity stats
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ServerStats {
    completions: RollingWindow,
    /// Lifetime operation completions.
    total_completions: u64,
    total_rework: u64,
    total_breakdowns: u64,
    /// Set while the server is down; the timestamp the outage began or the
    /// last window boundary, whichever is later.
    down_since: Option<SimTime>,
    /// Down time accumulated inside the current window.
    window_down: Fixed64,
    down_share_history: RingBuffer,
}

impl ServerStats {
    fn new(config: &StatsConfig) -> Self {
        Self {
            completions: RollingWindow::new(config.window_size),
            total_completions: 0,
            total_rework: 0,
            total_breakdowns: 0,
            down_since: None,
            window_down: Fixed64::ZERO,
            down_share_history: RingBuffer::new(config.history_capacity),
        }
    }
}

#[derive(Debug)]
struct StoreStats {
    picks: RollingWindow,
    total_picks: u64,
    total_picked_quantity: u64,
    total_deposited_quantity: u64,
    total_shorts: u64,
}

impl StoreStats {
    fn new(config: &StatsConfig) -> Self {
        Self {
            picks: RollingWindow::new(config.window_size),
            total_picks: 0,
            total_picked_quantity: 0,
            total_deposited_quantity: 0,
            total_shorts: 0,
        }
    }
}

#[derive(Debug)]
struct AgvStats {
    trips: RollingWindow,
    total_trips: u64,
}

impl AgvStats {
    fn new(config: &StatsConfig) -> Self {
        Self {
            trips: RollingWindow::new(config.window_size),
            total_trips: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ShopStats — the aggregator
// ---------------------------------------------------------------------------

/// Aggregates throughput, flow-time, and utilization-adjacent KPIs from the
/// event stream of one run.
#[derive(Debug)]
pub struct ShopStats {
    config: StatsConfig,

    servers: HashMap<ServerId, ServerStats>,
    stores: HashMap<StoreId, StoreStats>,
    agvs: HashMap<AgvId, AgvStats>,

    releases: RollingWindow,
    finishes: RollingWindow,
    total_released: u64,
    total_finished: u64,

    /// Release timestamps of jobs still on the floor, for flow-time
    /// measurement on finish.
    open_jobs: HashMap<JobId, SimTime>,
    flow_times: RingBuffer,

    /// Archived completions folded in via `observe_completed`, for the
    /// due-date KPIs the event stream does not carry.
    completions_observed: u64,
    tardy_observed: u64,

    throughput_history: RingBuffer,

    /// End of the last closed window, for down-share normalization.
    window_started_at: SimTime,
}

impl ShopStats {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            servers: HashMap::new(),
            stores: HashMap::new(),
            agvs: HashMap::new(),
            releases: RollingWindow::new(config.window_size),
            finishes: RollingWindow::new(config.window_size),
            total_released: 0,
            total_finished: 0,
            open_jobs: HashMap::new(),
            flow_times: RingBuffer::new(config.history_capacity),
            completions_observed: 0,
            tardy_observed: 0,
            throughput_history: RingBuffer::new(config.history_capacity),
            window_started_at: Fixed64::ZERO,
            config,
        }
    }

    // -- ingestion ----------------------------------------------------------

    /// Fold one event into the running statistics.
    pub fn process_event(&mut self, event: &Event) {
        match *event {
            Event::JobSubmitted { .. } => {}
            Event::JobReleased { job, at } => {
                self.releases.add(Fixed64::ONE);
                self.total_released += 1;
                self.open_jobs.insert(job, at);
            }
            Event::OperationStarted { .. } => {}
            Event::OperationCompleted { server, .. } => {
                let s = self.server_entry(server);
                s.completions.add(Fixed64::ONE);
                s.total_completions += 1;
            }
            Event::JobFinished { job, at } => {
                self.finishes.add(Fixed64::ONE);
                self.total_finished += 1;
                if let Some(released_at) = self.open_jobs.remove(&job) {
                    self.flow_times.push(at - released_at);
                }
            }
            Event::ReworkTriggered { server, .. } => {
                self.server_entry(server).total_rework += 1;
            }
            Event::ServerDown { server, at } => {
                let s = self.server_entry(server);
                s.total_breakdowns += 1;
                if s.down_since.is_none() {
                    s.down_since = Some(at);
                }
            }
            Event::ServerRepaired { server, at } => {
                let s = self.server_entry(server);
                if let Some(since) = s.down_since.take() {
                    s.window_down += at - since;
                }
            }
            Event::StockShort { store, .. } => {
                self.store_entry(store).total_shorts += 1;
            }
            Event::StockDeposited {
                store, quantity, ..
            } => {
                self.store_entry(store).total_deposited_quantity += u64::from(quantity);
            }
            Event::PickCompleted {
                store, quantity, ..
            } => {
                let s = self.store_entry(store);
                s.picks.add(Fixed64::ONE);
                s.total_picks += 1;
                s.total_picked_quantity += u64::from(quantity);
            }
            Event::AgvTripCompleted { agv, .. } => {
                let a = self.agv_entry(agv);
                a.trips.add(Fixed64::ONE);
                a.total_trips += 1;
            }
        }
    }

    /// Fold one archived completion in. Due dates never ride on events, so
    /// tardiness KPIs are fed from the engine's completed-job archive.
    pub fn observe_completed(&mut self, completed: &CompletedJob) {
        self.completions_observed += 1;
        if completed.band == DueDateBand::Tardy {
            self.tardy_observed += 1;
        }
    }

    /// Close the current reporting window at simulated time `now`. Commits
    /// every rolling window and appends one sample to each history buffer.
    pub fn end_window(&mut self, now: SimTime) {
        let span = now - self.window_started_at;

        self.throughput_history.push(self.finishes.current());

        for s in self.servers.values_mut() {
            // An outage spanning the boundary charges this window up to
            // `now` and restarts the meter.
            if let Some(since) = s.down_since.as_mut() {
                s.window_down += now - *since;
                *since = now;
            }
            let share = if span > Fixed64::ZERO {
                s.window_down / span
            } else {
                Fixed64::ZERO
            };
            s.down_share_history.push(share);
            s.window_down = Fixed64::ZERO;
            s.completions.commit();
        }
        for s in self.stores.values_mut() {
            s.picks.commit();
        }
        for a in self.agvs.values_mut() {
            a.trips.commit();
        }
        self.releases.commit();
        self.finishes.commit();

        self.window_started_at = now;
    }

    // -- global getters -----------------------------------------------------

    /// Jobs finished per window, rolling average.
    pub fn throughput(&self) -> Fixed64 {
        self.finishes.rate()
    }

    /// Jobs released to the floor per window, rolling average.
    pub fn release_rate(&self) -> Fixed64 {
        self.releases.rate()
    }

    pub fn total_released(&self) -> u64 {
        self.total_released
    }

    pub fn total_finished(&self) -> u64 {
        self.total_finished
    }

    /// Jobs released but not yet finished.
    pub fn jobs_on_floor(&self) -> usize {
        self.open_jobs.len()
    }

    /// Mean release-to-finish time over the retained history, zero when no
    /// job has finished yet.
    pub fn average_flow_time(&self) -> Fixed64 {
        self.flow_times.mean()
    }

    pub fn flow_time_history(&self) -> &RingBuffer {
        &self.flow_times
    }

    /// Share of observed completions that missed their due date, in [0, 1].
    /// Zero until `observe_completed` has been fed at least once.
    pub fn tardy_share(&self) -> Fixed64 {
        if self.completions_observed == 0 {
            return Fixed64::ZERO;
        }
        Fixed64::from_num(self.tardy_observed as u32)
            / Fixed64::from_num(self.completions_observed as u32)
    }

    /// Finished-jobs-per-window samples, one per closed window.
    pub fn throughput_history(&self) -> &RingBuffer {
        &self.throughput_history
    }

    // -- per-server getters --------------------------------------------------

    /// Operations completed per window at `server`, rolling average.
    pub fn server_completion_rate(&self, server: ServerId) -> Fixed64 {
        self.servers
            .get(&server)
            .map(|s| s.completions.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn server_total_completions(&self, server: ServerId) -> u64 {
        self.servers
            .get(&server)
            .map(|s| s.total_completions)
            .unwrap_or(0)
    }

    pub fn server_rework_count(&self, server: ServerId) -> u64 {
        self.servers
            .get(&server)
            .map(|s| s.total_rework)
            .unwrap_or(0)
    }

    pub fn server_breakdown_count(&self, server: ServerId) -> u64 {
        self.servers
            .get(&server)
            .map(|s| s.total_breakdowns)
            .unwrap_or(0)
    }

    /// Share of the last closed window the server spent down, in [0, 1].
    pub fn server_down_share(&self, server: ServerId) -> Fixed64 {
        self.servers
            .get(&server)
            .and_then(|s| s.down_share_history.latest())
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn server_down_share_history(&self, server: ServerId) -> Option<&RingBuffer> {
        self.servers.get(&server).map(|s| &s.down_share_history)
    }

    // -- per-store getters ----------------------------------------------------

    /// Picks served per window at `store`, rolling average.
    pub fn store_pick_rate(&self, store: StoreId) -> Fixed64 {
        self.stores
            .get(&store)
            .map(|s| s.picks.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn store_total_picks(&self, store: StoreId) -> u64 {
        self.stores.get(&store).map(|s| s.total_picks).unwrap_or(0)
    }

    pub fn store_short_count(&self, store: StoreId) -> u64 {
        self.stores.get(&store).map(|s| s.total_shorts).unwrap_or(0)
    }

    pub fn store_picked_quantity(&self, store: StoreId) -> u64 {
        self.stores
            .get(&store)
            .map(|s| s.total_picked_quantity)
            .unwrap_or(0)
    }

    pub fn store_deposited_quantity(&self, store: StoreId) -> u64 {
        self.stores
            .get(&store)
            .map(|s| s.total_deposited_quantity)
            .unwrap_or(0)
    }

    /// Fraction of pick demands that hit a stockout first, in [0, 1].
    pub fn store_short_share(&self, store: StoreId) -> Fixed64 {
        let Some(s) = self.stores.get(&store) else {
            return Fixed64::ZERO;
        };
        let demands = s.total_shorts + s.total_picks;
        if demands == 0 {
            return Fixed64::ZERO;
        }
        Fixed64::from_num(s.total_shorts as u32) / Fixed64::from_num(demands as u32)
    }

    // -- per-vehicle getters ---------------------------------------------------

    /// Delivery trips per window by `agv`, rolling average.
    pub fn agv_trip_rate(&self, agv: AgvId) -> Fixed64 {
        self.agvs
            .get(&agv)
            .map(|a| a.trips.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn agv_total_trips(&self, agv: AgvId) -> u64 {
        self.agvs.get(&agv).map(|a| a.total_trips).unwrap_or(0)
    }

    // -- maintenance -----------------------------------------------------------

    /// Drop all state for a server (e.g. after decommissioning it mid-run).
    pub fn remove_server(&mut self, server: ServerId) {
        self.servers.remove(&server);
    }

    /// Reset everything, keeping the configuration.
    pub fn clear(&mut self) {
        *self = Self::new(self.config);
    }

    // -- entry helpers -----------------------------------------------------------

    fn server_entry(&mut self, server: ServerId) -> &mut ServerStats {
        self.servers
            .entry(server)
            .or_insert_with(|| ServerStats::new(&self.config))
    }

    fn store_entry(&mut self, store: StoreId) -> &mut StoreStats {
        self.stores
            .entry(store)
            .or_insert_with(|| StoreStats::new(&self.config))
    }

    fn agv_entry(&mut self, agv: AgvId) -> &mut AgvStats {
        self.agvs
            .entry(agv)
            .or_insert_with(|| AgvStats::new(&self.config))
    }
}

impl Default for ShopStats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shopsim_core::id::ProductId;
    use slotmap::SlotMap;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fx(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn assert_fixed_approx(actual: Fixed64, expected: Fixed64, tolerance: Fixed64) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= tolerance,
            "expected ~{expected}, got {actual} (tolerance {tolerance})"
        );
    }

    fn job_id() -> JobId {
        let mut sm = SlotMap::<JobId, ()>::with_key();
        sm.insert(())
    }

    fn job_ids(n: usize) -> Vec<JobId> {
        let mut sm = SlotMap::<JobId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    fn server_id() -> ServerId {
        let mut sm = SlotMap::<ServerId, ()>::with_key();
        sm.insert(())
    }

    fn store_id() -> StoreId {
        let mut sm = SlotMap::<StoreId, ()>::with_key();
        sm.insert(())
    }

    fn agv_id() -> AgvId {
        let mut sm = SlotMap::<AgvId, ()>::with_key();
        sm.insert(())
    }

    fn small_config() -> StatsConfig {
        StatsConfig {
            window_size: 4,
            history_capacity: 8,
        }
    }

    fn released(job: JobId, t: f64) -> Event {
        Event::JobReleased { job, at: fx(t) }
    }

    fn finished(job: JobId, t: f64) -> Event {
        Event::JobFinished { job, at: fx(t) }
    }

    fn completed(server: ServerId, t: f64) -> Event {
        Event::OperationCompleted {
            job: job_id(),
            server,
            op_index: 0,
            at: fx(t),
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Ring buffer push, latest, and iteration order
    // -----------------------------------------------------------------------
    #[test]
    fn ring_buffer_basics() {
        let mut rb = RingBuffer::new(4);
        assert!(rb.is_empty());
        assert_eq!(rb.latest(), None);

        rb.push(fx(1.0));
        rb.push(fx(2.0));
        rb.push(fx(3.0));

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.latest(), Some(fx(3.0)));
        assert_eq!(rb.to_vec(), vec![fx(1.0), fx(2.0), fx(3.0)]);
    }

    // -----------------------------------------------------------------------
    // Test 2: Ring buffer overwrites oldest when full
    // -----------------------------------------------------------------------
    #[test]
    fn ring_buffer_overwrites_oldest() {
        let mut rb = RingBuffer::new(3);
        for v in 1..=5 {
            rb.push(fx(v as f64));
        }
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![fx(3.0), fx(4.0), fx(5.0)]);
        assert_eq!(rb.latest(), Some(fx(5.0)));
    }

    // -----------------------------------------------------------------------
    // Test 3: Ring buffer mean, and zero when empty
    // -----------------------------------------------------------------------
    #[test]
    fn ring_buffer_mean() {
        let mut rb = RingBuffer::new(8);
        assert_eq!(rb.mean(), Fixed64::ZERO);

        rb.push(fx(1.0));
        rb.push(fx(2.0));
        rb.push(fx(6.0));
        assert_fixed_approx(rb.mean(), fx(3.0), fx(0.0001));
    }

    // -----------------------------------------------------------------------
    // Test 4: Ring buffer rejects zero capacity
    // -----------------------------------------------------------------------
    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn ring_buffer_zero_capacity_panics() {
        let _ = RingBuffer::new(0);
    }

    // -----------------------------------------------------------------------
    // Test 5: Empty aggregator answers zero everywhere
    // -----------------------------------------------------------------------
    #[test]
    fn empty_stats_all_zero() {
        let stats = ShopStats::new(small_config());
        assert_eq!(stats.throughput(), Fixed64::ZERO);
        assert_eq!(stats.release_rate(), Fixed64::ZERO);
        assert_eq!(stats.average_flow_time(), Fixed64::ZERO);
        assert_eq!(stats.total_finished(), 0);
        assert_eq!(stats.server_completion_rate(server_id()), Fixed64::ZERO);
        assert_eq!(stats.store_pick_rate(store_id()), Fixed64::ZERO);
        assert_eq!(stats.agv_trip_rate(agv_id()), Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 6: Throughput counts finishes and averages over windows
    // -----------------------------------------------------------------------
    #[test]
    fn throughput_rolling_average() {
        let mut stats = ShopStats::new(small_config());
        let jobs = job_ids(3);

        // Window 1: two finishes, window 2: one.
        for (i, job) in jobs.iter().take(2).enumerate() {
            stats.process_event(&released(*job, i as f64));
            stats.process_event(&finished(*job, 5.0 + i as f64));
        }
        stats.end_window(fx(10.0));

        stats.process_event(&released(jobs[2], 10.0));
        stats.process_event(&finished(jobs[2], 15.0));
        stats.end_window(fx(20.0));

        // (2 + 1 + 0) over 2 closed windows plus the empty current one.
        assert_fixed_approx(stats.throughput(), fx(1.0), fx(0.0001));
        assert_eq!(stats.total_finished(), 3);
    }

    // -----------------------------------------------------------------------
    // Test 7: In-progress window already contributes to the rate
    // -----------------------------------------------------------------------
    #[test]
    fn in_progress_window_counts() {
        let mut stats = ShopStats::new(small_config());
        let job = job_id();

        stats.process_event(&released(job, 0.0));
        stats.process_event(&finished(job, 3.0));

        // One finish, zero closed windows, one contributor.
        assert_fixed_approx(stats.throughput(), fx(1.0), fx(0.0001));
    }

    // -----------------------------------------------------------------------
    // Test 8: Flow time is measured from release to finish
    // -----------------------------------------------------------------------
    #[test]
    fn flow_time_release_to_finish() {
        let mut stats = ShopStats::new(small_config());
        let jobs = job_ids(2);

        stats.process_event(&released(jobs[0], 1.0));
        stats.process_event(&released(jobs[1], 2.0));
        assert_eq!(stats.jobs_on_floor(), 2);

        stats.process_event(&finished(jobs[0], 5.0)); // flow 4
        stats.process_event(&finished(jobs[1], 10.0)); // flow 8

        assert_eq!(stats.jobs_on_floor(), 0);
        assert_fixed_approx(stats.average_flow_time(), fx(6.0), fx(0.0001));
        assert_eq!(stats.flow_time_history().to_vec(), vec![fx(4.0), fx(8.0)]);
    }

    // -----------------------------------------------------------------------
    // Test 9: A finish without a matching release records no flow time
    // -----------------------------------------------------------------------
    #[test]
    fn finish_without_release_ignored_for_flow_time() {
        let mut stats = ShopStats::new(small_config());
        stats.process_event(&finished(job_id(), 5.0));

        assert_eq!(stats.total_finished(), 1);
        assert!(stats.flow_time_history().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 10: Per-server completions and rework are attributed correctly
    // -----------------------------------------------------------------------
    #[test]
    fn server_attribution() {
        let mut stats = ShopStats::new(small_config());
        let m1 = server_id();
        let m2 = server_id();

        stats.process_event(&completed(m1, 1.0));
        stats.process_event(&completed(m1, 2.0));
        stats.process_event(&completed(m2, 2.0));
        stats.process_event(&Event::ReworkTriggered {
            job: job_id(),
            server: m2,
            loopback: 0,
            at: fx(2.0),
        });

        assert_eq!(stats.server_total_completions(m1), 2);
        assert_eq!(stats.server_total_completions(m2), 1);
        assert_eq!(stats.server_rework_count(m1), 0);
        assert_eq!(stats.server_rework_count(m2), 1);
    }

    // -----------------------------------------------------------------------
    // Test 11: Down share within one window
    // -----------------------------------------------------------------------
    #[test]
    fn down_share_single_window() {
        let mut stats = ShopStats::new(small_config());
        let m = server_id();

        stats.process_event(&Event::ServerDown { server: m, at: fx(2.0) });
        stats.process_event(&Event::ServerRepaired { server: m, at: fx(4.0) });
        stats.end_window(fx(10.0));

        // Down 2 of 10 time units.
        assert_fixed_approx(stats.server_down_share(m), fx(0.2), fx(0.0001));
        assert_eq!(stats.server_breakdown_count(m), 1);
    }

    // -----------------------------------------------------------------------
    // Test 12: An outage spanning a window boundary is split across windows
    // -----------------------------------------------------------------------
    #[test]
    fn down_share_spans_boundary() {
        let mut stats = ShopStats::new(small_config());
        let m = server_id();

        stats.process_event(&Event::ServerDown { server: m, at: fx(8.0) });
        stats.end_window(fx(10.0)); // down 2 of 10
        assert_fixed_approx(stats.server_down_share(m), fx(0.2), fx(0.0001));

        stats.process_event(&Event::ServerRepaired { server: m, at: fx(15.0) });
        stats.end_window(fx(20.0)); // down 5 of 10
        assert_fixed_approx(stats.server_down_share(m), fx(0.5), fx(0.0001));
        assert_eq!(stats.server_breakdown_count(m), 1);
    }

    // -----------------------------------------------------------------------
    // Test 13: Store picks, shorts, and the short share
    // -----------------------------------------------------------------------
    #[test]
    fn store_picks_and_shorts() {
        let mut stats = ShopStats::new(small_config());
        let wh = store_id();

        stats.process_event(&Event::StockShort {
            store: wh,
            product: ProductId(0),
            missing: 3,
            at: fx(1.0),
        });
        for t in 2..5 {
            stats.process_event(&Event::PickCompleted {
                store: wh,
                job: job_id(),
                product: ProductId(0),
                quantity: 2,
                at: fx(t as f64),
            });
        }

        assert_eq!(stats.store_total_picks(wh), 3);
        assert_eq!(stats.store_short_count(wh), 1);
        assert_eq!(stats.store_picked_quantity(wh), 6);
        assert_fixed_approx(stats.store_short_share(wh), fx(0.25), fx(0.0001));
    }

    // -----------------------------------------------------------------------
    // Test 14: Deposited quantity accumulates
    // -----------------------------------------------------------------------
    #[test]
    fn store_deposits_accumulate() {
        let mut stats = ShopStats::new(small_config());
        let wh = store_id();

        for qty in [5u32, 7] {
            stats.process_event(&Event::StockDeposited {
                store: wh,
                product: ProductId(1),
                quantity: qty,
                at: fx(1.0),
            });
        }
        assert_eq!(stats.store_deposited_quantity(wh), 12);
    }

    // -----------------------------------------------------------------------
    // Test 15: AGV trips per window
    // -----------------------------------------------------------------------
    #[test]
    fn agv_trip_rate() {
        let mut stats = ShopStats::new(small_config());
        let agv = agv_id();

        for t in 0..4 {
            stats.process_event(&Event::AgvTripCompleted {
                agv,
                job: job_id(),
                at: fx(t as f64),
            });
        }
        stats.end_window(fx(10.0));
        stats.end_window(fx(20.0));

        // 4 trips over 2 closed windows plus the empty current one.
        assert_fixed_approx(stats.agv_trip_rate(agv), fx(4.0 / 3.0), fx(0.0001));
        assert_eq!(stats.agv_total_trips(agv), 4);
    }

    // -----------------------------------------------------------------------
    // Test 16: Rolling windows forget beyond window_size
    // -----------------------------------------------------------------------
    #[test]
    fn rolling_window_forgets_old_windows() {
        let mut stats = ShopStats::new(StatsConfig {
            window_size: 2,
            history_capacity: 8,
        });
        let jobs = job_ids(4);

        for job in &jobs {
            stats.process_event(&released(*job, 0.0));
            stats.process_event(&finished(*job, 1.0));
        }
        stats.end_window(fx(10.0)); // closed: [4]

        for t in 1..=4u32 {
            stats.end_window(fx(10.0 + 10.0 * f64::from(t)));
        }

        // The busy window has rolled out of the two retained windows.
        assert_eq!(stats.throughput(), Fixed64::ZERO);
        assert_eq!(stats.total_finished(), 4);
    }

    // -----------------------------------------------------------------------
    // Test 17: Throughput history records one sample per closed window
    // -----------------------------------------------------------------------
    #[test]
    fn throughput_history_per_window() {
        let mut stats = ShopStats::new(small_config());
        let jobs = job_ids(3);

        stats.process_event(&released(jobs[0], 0.0));
        stats.process_event(&finished(jobs[0], 1.0));
        stats.end_window(fx(10.0));

        stats.process_event(&released(jobs[1], 10.0));
        stats.process_event(&finished(jobs[1], 11.0));
        stats.process_event(&released(jobs[2], 10.0));
        stats.process_event(&finished(jobs[2], 12.0));
        stats.end_window(fx(20.0));

        assert_eq!(
            stats.throughput_history().to_vec(),
            vec![fx(1.0), fx(2.0)]
        );
    }

    // -----------------------------------------------------------------------
    // Test 18: remove_server drops its state, clear resets everything
    // -----------------------------------------------------------------------
    #[test]
    fn remove_and_clear() {
        let mut stats = ShopStats::new(small_config());
        let m = server_id();
        let job = job_id();

        stats.process_event(&completed(m, 1.0));
        stats.process_event(&released(job, 0.0));
        stats.process_event(&finished(job, 2.0));

        stats.remove_server(m);
        assert_eq!(stats.server_total_completions(m), 0);

        stats.clear();
        assert_eq!(stats.total_finished(), 0);
        assert_eq!(stats.throughput(), Fixed64::ZERO);
        assert!(stats.flow_time_history().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 19: Tardy share from observed completions
    // -----------------------------------------------------------------------
    #[test]
    fn tardy_share_from_archive() {
        use shopsim_core::id::FamilyId;

        let mut stats = ShopStats::new(small_config());
        assert_eq!(stats.tardy_share(), Fixed64::ZERO);

        let record = |band: DueDateBand| CompletedJob {
            job: job_id(),
            family: FamilyId(0),
            created_at: fx(0.0),
            released_at: fx(0.0),
            finished_at: fx(10.0),
            due_date: fx(8.0),
            makespan: fx(10.0),
            lateness: fx(2.0),
            band,
            total_queue_time: fx(0.0),
            rework_visits: 0,
        };

        stats.observe_completed(&record(DueDateBand::Tardy));
        stats.observe_completed(&record(DueDateBand::Early));
        stats.observe_completed(&record(DueDateBand::InWindow));
        stats.observe_completed(&record(DueDateBand::Tardy));

        assert_fixed_approx(stats.tardy_share(), fx(0.5), fx(0.0001));
    }

    // -----------------------------------------------------------------------
    // Test 20: Release rate is independent of finishes
    // -----------------------------------------------------------------------
    #[test]
    fn release_rate_tracks_releases_only() {
        let mut stats = ShopStats::new(small_config());
        let jobs = job_ids(3);

        for job in &jobs {
            stats.process_event(&released(*job, 0.0));
        }
        assert_fixed_approx(stats.release_rate(), fx(3.0), fx(0.0001));
        assert_eq!(stats.throughput(), Fixed64::ZERO);
        assert_eq!(stats.jobs_on_floor(), 3);
        assert_eq!(stats.total_released(), 3);
    }
}
