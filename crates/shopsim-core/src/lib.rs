//! Shopsim Core -- a discrete-event simulation kernel for manufacturing
//! job-shops with intralogistics.
//!
//! The crate models a shop floor as capacity-limited servers fed from a
//! pre-shop pool, with warehouse stores and guided vehicles staging material
//! to operations that need it. Time is event-driven: a cooperative clock
//! pops scheduled wakes in `(time, sequence)` order and the engine advances
//! job state machines in response. Nothing runs on wall-clock time and
//! nothing blocks a thread.
//!
//! # Run Anatomy
//!
//! 1. **Build** -- [`builder::ShopBuilder`] registers servers, stores, and
//!    vehicles, picks a release policy, and validates the whole
//!    configuration once.
//! 2. **Feed** -- jobs enter through [`engine::Engine::submit`], scheduled
//!    arrivals, or a pull-based [`engine::JobSource`].
//! 3. **Release** -- jobs wait in the pre-shop pool until the configured
//!    [`policies::ReleasePolicy`] admits them to the floor.
//! 4. **Flow** -- each operation queues at its server, stages material via
//!    store picks and AGV trips when required, processes, and moves on;
//!    inspection servers may loop a job back for rework.
//! 5. **Observe** -- every transition is emitted on the
//!    [`event::EventBus`]; finished jobs land in an immutable archive with
//!    flow-time EMAs alongside.
//!
//! # Determinism
//!
//! A seed fully determines a run. All stochastic elements draw from one
//! engine-owned SplitMix64 instance, time is Q32.32 fixed-point, and every
//! queue in the system breaks ties by arrival order.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- one simulation run; owns clock, RNG, and registries.
//! - [`builder::ShopBuilder`] -- validated construction.
//! - [`job::JobSpec`] / [`job::Job`] -- routed units of work.
//! - [`server::Server`] -- priority-queued processing resources, with faulty
//!   and inspection variants.
//! - [`store::Store`] / [`agv::Agv`] -- warehouse bays, inventory, and
//!   transport vehicles.
//! - [`policies::ReleasePolicy`] -- immediate, workload-norm, slack-driven,
//!   and scored release.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`event::EventBus`] -- per-kind ring buffers with buffered delivery.

pub mod agv;
pub mod builder;
pub mod clock;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod id;
pub mod job;
pub mod materials;
pub mod policies;
pub mod psp;
pub mod rng;
pub mod server;
pub mod shopfloor;
pub mod store;
pub mod validation;
pub mod wip;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
