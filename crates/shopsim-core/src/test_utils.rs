//! Shared test helpers for integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and integration tests (via the `test-utils`
//! feature).

use crate::agv::{Agv, Location, TravelModel};
use crate::builder::ShopBuilder;
use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::job::{JobSpec, MaterialNeed, OperationSpec};
use crate::rng::Sample;
use crate::server::{Server, ServerKind};
use crate::store::Store;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Product constructors
// ===========================================================================

pub fn bolts() -> ProductId {
    ProductId(0)
}
pub fn sheet_metal() -> ProductId {
    ProductId(1)
}
pub fn castings() -> ProductId {
    ProductId(2)
}

// ===========================================================================
// Job constructors
// ===========================================================================

/// A one-operation job: `p` time units at `server`, due at `due`.
pub fn simple_job(server: ServerId, p: f64, due: f64) -> JobSpec {
    JobSpec::new(
        FamilyId(0),
        vec![OperationSpec::new(server, fixed(p))],
        fixed(due),
    )
}

/// A job routed over several servers with the given processing times.
pub fn routed_job(route: &[(ServerId, f64)], due: f64) -> JobSpec {
    let ops = route
        .iter()
        .map(|&(server, p)| OperationSpec::new(server, fixed(p)))
        .collect();
    JobSpec::new(FamilyId(0), ops, fixed(due))
}

/// A one-operation job whose operation needs `quantity` units of `product`
/// delivered before processing can start.
pub fn material_job(
    server: ServerId,
    p: f64,
    due: f64,
    product: ProductId,
    quantity: u32,
) -> JobSpec {
    JobSpec::new(
        FamilyId(0),
        vec![OperationSpec::new(server, fixed(p)).with_material(MaterialNeed {
            product,
            quantity,
            store: None,
        })],
        fixed(due),
    )
}

// ===========================================================================
// Shop builders
// ===========================================================================

/// One standard server, capacity 1, immediate release.
pub fn one_machine_shop() -> (Engine, ServerId) {
    let mut builder = ShopBuilder::new();
    let server = builder.add_server(Server::new("m1", 1, ServerKind::Standard));
    (builder.build_or_panic(), server)
}

/// `n` standard servers, capacity 1 each, immediate release.
pub fn flow_shop(n: usize) -> (Engine, Vec<ServerId>) {
    let mut builder = ShopBuilder::new();
    let servers = (0..n)
        .map(|i| builder.add_server(Server::new(format!("m{i}"), 1, ServerKind::Standard)))
        .collect();
    (builder.build_or_panic(), servers)
}

/// One server, one store with deterministic pick/put times, one vehicle with
/// a fixed travel time. The canonical intralogistics fixture.
pub fn warehouse_shop(
    pick: f64,
    put: f64,
    travel: f64,
) -> (Engine, ServerId, StoreId, AgvId) {
    let mut builder = ShopBuilder::new();
    let server = builder
        .add_server(Server::new("m1", 1, ServerKind::Standard).with_location(Location::new(5, 0)));
    let store = builder.add_store(
        Store::new("wh", 1)
            .with_service_times(Sample::Constant(fixed(pick)), Sample::Constant(fixed(put)))
            .with_location(Location::new(0, 0)),
    );
    let agv = builder.add_agv(Agv::new("agv1", TravelModel::Fixed(fixed(travel))));
    (builder.build_or_panic(), server, store, agv)
}

impl ShopBuilder {
    /// `build` for fixtures that are well-formed by construction.
    pub fn build_or_panic(self) -> Engine {
        match self.build() {
            Ok(engine) => engine,
            Err(err) => panic!("fixture failed to build: {err}"),
        }
    }
}

// ===========================================================================
// Run helpers
// ===========================================================================

/// Run to `until` and return the finish times of every completed job in
/// archive order.
pub fn finish_times(engine: &mut Engine, until: f64) -> Vec<Fixed64> {
    match engine.run(fixed(until)) {
        Ok(_) => {}
        Err(err) => panic!("run failed: {err}"),
    }
    engine.completed().iter().map(|c| c.finished_at).collect()
}
