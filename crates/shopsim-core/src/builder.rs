//! Shop construction.
//!
//! [`ShopBuilder`] collects servers, stores, vehicles, the release policy,
//! and the tuning knobs, validates the whole configuration once, and hands
//! out a ready [`Engine`]. Everything that can make a run impossible is
//! rejected here; past `build` the engine assumes a well-formed shop.

use crate::agv::{Agv, TravelModel};
use crate::engine::{Engine, EngineSeed, JobSource};
use crate::fixed::{f64_to_fixed64, Duration, Fixed64, SimTime};
use crate::id::{AgvId, ServerId, StoreId};
use crate::job::JobSpec;
use crate::policies::{AgvSelection, ReleasePolicy, StoreSelection, WipStrategy};
use crate::server::{Server, ServerKind};
use crate::store::Store;
use crate::validation::{validate_spec, BuildError};
use slotmap::SlotMap;

/// Builder for an [`Engine`]. Resources are registered up front; jobs can be
/// pre-registered here or handed to the running engine later.
pub struct ShopBuilder {
    seed: u64,
    servers: SlotMap<ServerId, Server>,
    stores: SlotMap<StoreId, Store>,
    agvs: SlotMap<AgvId, Agv>,
    policy: ReleasePolicy,
    starvation_avoidance: bool,
    agv_selection: AgvSelection,
    store_selection: StoreSelection,
    wip_strategy: WipStrategy,
    ema_alpha: Fixed64,
    due_window: Duration,
    event_capacity: usize,
    arrivals: Vec<(SimTime, JobSpec)>,
    source: Option<Box<dyn JobSource>>,
}

impl Default for ShopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShopBuilder {
    pub fn new() -> Self {
        Self {
            seed: 0,
            servers: SlotMap::with_key(),
            stores: SlotMap::with_key(),
            agvs: SlotMap::with_key(),
            policy: ReleasePolicy::Immediate,
            starvation_avoidance: false,
            agv_selection: AgvSelection::LeastWorkload,
            store_selection: StoreSelection::FirstWithStock,
            wip_strategy: WipStrategy::Corrected,
            ema_alpha: f64_to_fixed64(0.01),
            due_window: f64_to_fixed64(7.0),
            event_capacity: 1024,
            arrivals: Vec::new(),
            source: None,
        }
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    pub fn add_server(&mut self, server: Server) -> ServerId {
        self.servers.insert(server)
    }

    pub fn add_store(&mut self, store: Store) -> StoreId {
        self.stores.insert(store)
    }

    pub fn add_agv(&mut self, agv: Agv) -> AgvId {
        self.agvs.insert(agv)
    }

    // -----------------------------------------------------------------------
    // Knobs
    // -----------------------------------------------------------------------

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compose a starvation-avoidance bypass onto a non-immediate policy:
    /// an arriving job whose first server is starving is released at once.
    pub fn starvation_avoidance(mut self, on: bool) -> Self {
        self.starvation_avoidance = on;
        self
    }

    pub fn agv_selection(mut self, policy: AgvSelection) -> Self {
        self.agv_selection = policy;
        self
    }

    pub fn store_selection(mut self, policy: StoreSelection) -> Self {
        self.store_selection = policy;
        self
    }

    pub fn wip_strategy(mut self, strategy: WipStrategy) -> Self {
        self.wip_strategy = strategy;
        self
    }

    pub fn ema_alpha(mut self, alpha: Fixed64) -> Self {
        self.ema_alpha = alpha;
        self
    }

    /// Width of the delivery window `[due - window, due]`.
    pub fn due_window(mut self, window: Duration) -> Self {
        self.due_window = window;
        self
    }

    /// Ring-buffer capacity per event kind.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// Pre-register a job that enters the pool at `at`. Validated at build.
    pub fn schedule_arrival(&mut self, at: SimTime, spec: JobSpec) {
        self.arrivals.push((at, spec));
    }

    /// Attach a pull-based job source, polled from time zero onwards.
    pub fn job_source(mut self, source: Box<dyn JobSource>) -> Self {
        self.source = Some(source);
        self
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build(self) -> Result<Engine, BuildError> {
        if self.servers.is_empty() {
            return Err(BuildError::NoServers);
        }

        for server in self.servers.values() {
            if server.capacity == 0 {
                return Err(BuildError::ZeroServerCapacity {
                    name: server.name.clone(),
                });
            }
            if let Some(setup) = &server.setup {
                if !setup.is_valid() {
                    return Err(BuildError::InvalidSample {
                        what: format!("setup of server `{}`", server.name),
                    });
                }
            }
            match &server.kind {
                ServerKind::Standard => {}
                ServerKind::Faulty {
                    time_between_failures,
                    repair_time,
                } => {
                    if !time_between_failures.is_valid() {
                        return Err(BuildError::InvalidSample {
                            what: format!("time between failures of server `{}`", server.name),
                        });
                    }
                    if !repair_time.is_valid() {
                        return Err(BuildError::InvalidSample {
                            what: format!("repair time of server `{}`", server.name),
                        });
                    }
                }
                ServerKind::Inspection {
                    rework_probability, ..
                } => {
                    let p = *rework_probability;
                    if p < Fixed64::ZERO || p > Fixed64::from_num(1) {
                        return Err(BuildError::InvalidReworkProbability {
                            name: server.name.clone(),
                            value: p,
                        });
                    }
                }
            }
        }

        for store in self.stores.values() {
            if store.bay_capacity == 0 {
                return Err(BuildError::ZeroBayCapacity {
                    name: store.name.clone(),
                });
            }
            if !store.pick_time.is_valid() {
                return Err(BuildError::InvalidSample {
                    what: format!("pick time of store `{}`", store.name),
                });
            }
            if !store.put_time.is_valid() {
                return Err(BuildError::InvalidSample {
                    what: format!("put time of store `{}`", store.name),
                });
            }
        }

        for agv in self.agvs.values() {
            if !agv.load_time.is_valid() || !agv.unload_time.is_valid() {
                return Err(BuildError::InvalidSample {
                    what: format!("handling times of vehicle `{}`", agv.name),
                });
            }
            let travel_ok = match &agv.travel {
                TravelModel::Fixed(d) => *d >= Duration::ZERO,
                TravelModel::Manhattan { time_per_cell } => *time_per_cell >= Duration::ZERO,
            };
            if !travel_ok {
                return Err(BuildError::InvalidSample {
                    what: format!("travel model of vehicle `{}`", agv.name),
                });
            }
        }

        if self.ema_alpha <= Fixed64::ZERO || self.ema_alpha > Fixed64::from_num(1) {
            return Err(BuildError::InvalidEmaAlpha {
                alpha: self.ema_alpha,
            });
        }

        self.validate_policy()?;

        for (_, spec) in &self.arrivals {
            validate_spec(spec, &self.servers, &self.stores, &self.agvs)?;
        }

        Ok(Engine::from_seed(EngineSeed {
            seed: self.seed,
            servers: self.servers,
            stores: self.stores,
            agvs: self.agvs,
            policy: self.policy,
            starvation_avoidance: self.starvation_avoidance,
            agv_selection: self.agv_selection,
            store_selection: self.store_selection,
            wip_strategy: self.wip_strategy,
            ema_alpha: self.ema_alpha,
            due_window: self.due_window,
            event_capacity: self.event_capacity,
            arrivals: self.arrivals,
            source: self.source,
        }))
    }

    fn validate_policy(&self) -> Result<(), BuildError> {
        match &self.policy {
            ReleasePolicy::Immediate => Ok(()),
            ReleasePolicy::WorkloadNorm {
                norms,
                allowance,
                check_interval,
            } => {
                if *check_interval <= Duration::ZERO {
                    return Err(BuildError::NonPositiveCheckInterval);
                }
                if *allowance < Duration::ZERO {
                    return Err(BuildError::NegativeAllowance);
                }
                // A norm-based policy with no norms at all gates nothing;
                // partial maps are fine (unlisted servers are unconstrained).
                if norms.is_empty() {
                    let name = self
                        .servers
                        .values()
                        .next()
                        .map(|s| s.name.clone())
                        .unwrap_or_default();
                    return Err(BuildError::MissingNorm { name });
                }
                Ok(())
            }
            ReleasePolicy::SlackDriven { allowance } => {
                if *allowance < Duration::ZERO {
                    return Err(BuildError::NegativeAllowance);
                }
                Ok(())
            }
            ReleasePolicy::Scored { allowance, .. } => {
                if *allowance < Duration::ZERO {
                    return Err(BuildError::NegativeAllowance);
                }
                Ok(())
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
