//! Material coordination.
//!
//! When an operation carries a [`MaterialNeed`](crate::job::MaterialNeed),
//! the job must not start processing until the material stands at its
//! server. The engine walks the job through the phases below while the job
//! keeps holding its server grant, so later arrivals at the same server
//! wait behind it (strict FIFO blocking).
//!
//! Store and AGV selection are pure functions over the registries; the
//! tie-break is always registration order, which keeps runs reproducible.

use crate::agv::{Agv, Location};
use crate::id::{AgvId, ProductId, StoreId};
use crate::policies::{AgvSelection, StoreSelection};
use crate::store::Store;
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Where a material requirement currently stands. The server grant is held
/// throughout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialPhase {
    /// Waiting for a warehouse bay.
    QueuedBay { store: StoreId },
    /// Bay held, waiting for a deposit to cover the need.
    AwaitingStock { store: StoreId },
    /// Bay held, stock reserved, pick hold running.
    Picking { store: StoreId },
    /// Pick done, bay released, mission queued on a vehicle.
    AwaitingAgv { store: StoreId, agv: AgvId },
    /// Vehicle is loading at the store.
    Loading { agv: AgvId },
    /// Vehicle is on its way to the server.
    Traveling { agv: AgvId },
    /// Vehicle is unloading at the server.
    Unloading { agv: AgvId },
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Pick the store that serves an unpinned material need.
///
/// `FirstWithStock` falls back to the first registered store when every
/// store is short; the withdrawal then waits there for a deposit.
pub fn select_store(
    policy: StoreSelection,
    stores: &SlotMap<StoreId, Store>,
    product: ProductId,
    quantity: u32,
) -> Option<StoreId> {
    match policy {
        StoreSelection::FirstWithStock => stores
            .iter()
            .find(|(_, s)| s.stock_of(product) >= quantity)
            .map(|(id, _)| id)
            .or_else(|| stores.keys().next()),
        StoreSelection::MostStock => {
            let mut best: Option<(StoreId, u32)> = None;
            for (id, store) in stores.iter() {
                let stock = store.stock_of(product);
                if best.map(|(_, b)| stock > b).unwrap_or(true) {
                    best = Some((id, stock));
                }
            }
            best.map(|(id, _)| id)
        }
    }
}

/// Pick the vehicle that serves a delivery from `source`.
pub fn select_agv(
    policy: AgvSelection,
    agvs: &SlotMap<AgvId, Agv>,
    source: Location,
) -> Option<AgvId> {
    match policy {
        AgvSelection::LeastWorkload => {
            let mut best: Option<(AgvId, usize)> = None;
            for (id, agv) in agvs.iter() {
                let backlog = agv.backlog();
                if best.map(|(_, b)| backlog < b).unwrap_or(true) {
                    best = Some((id, backlog));
                }
            }
            best.map(|(id, _)| id)
        }
        AgvSelection::NearestToSource => {
            let mut best: Option<(AgvId, u32)> = None;
            for (id, agv) in agvs.iter() {
                let distance = agv.location().distance(source);
                if best.map(|(_, b)| distance < b).unwrap_or(true) {
                    best = Some((id, distance));
                }
            }
            best.map(|(id, _)| id)
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agv::TravelModel;
    use crate::fixed::f64_to_fixed64;

    fn store_map(stocks: &[u32]) -> (SlotMap<StoreId, Store>, Vec<StoreId>) {
        let mut map = SlotMap::with_key();
        let ids = stocks
            .iter()
            .enumerate()
            .map(|(i, &stock)| {
                map.insert(Store::new(format!("wh{i}"), 1).with_stock(ProductId(0), stock))
            })
            .collect();
        (map, ids)
    }

    fn agv_map(locations: &[(i32, i32)]) -> (SlotMap<AgvId, Agv>, Vec<AgvId>) {
        let mut map = SlotMap::with_key();
        let ids = locations
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                map.insert(
                    Agv::new(format!("agv{i}"), TravelModel::Fixed(f64_to_fixed64(1.0)))
                        .with_location(Location::new(x, y)),
                )
            })
            .collect();
        (map, ids)
    }

    // -----------------------------------------------------------------------
    // Test 1: FirstWithStock skips short stores
    // -----------------------------------------------------------------------
    #[test]
    fn first_with_stock_skips_short() {
        let (stores, ids) = store_map(&[1, 10, 10]);
        let chosen = select_store(StoreSelection::FirstWithStock, &stores, ProductId(0), 5);
        assert_eq!(chosen, Some(ids[1]));
    }

    // -----------------------------------------------------------------------
    // Test 2: FirstWithStock falls back to the first store when all short
    // -----------------------------------------------------------------------
    #[test]
    fn first_with_stock_fallback() {
        let (stores, ids) = store_map(&[1, 2]);
        let chosen = select_store(StoreSelection::FirstWithStock, &stores, ProductId(0), 5);
        assert_eq!(chosen, Some(ids[0]));
    }

    // -----------------------------------------------------------------------
    // Test 3: MostStock picks the deepest store, registration order ties
    // -----------------------------------------------------------------------
    #[test]
    fn most_stock_picks_deepest() {
        let (stores, ids) = store_map(&[3, 9, 9]);
        let chosen = select_store(StoreSelection::MostStock, &stores, ProductId(0), 1);
        assert_eq!(chosen, Some(ids[1]));
    }

    // -----------------------------------------------------------------------
    // Test 4: LeastWorkload counts queued and active missions
    // -----------------------------------------------------------------------
    #[test]
    fn least_workload_counts_backlog() {
        let (mut agvs, ids) = agv_map(&[(0, 0), (0, 0)]);
        let (jstores, jids) = store_map(&[0]);
        let _ = jstores;

        use crate::agv::Mission;
        use slotmap::SlotMap;
        let mut jobs = SlotMap::<crate::id::JobId, ()>::with_key();
        let mut servers = SlotMap::<crate::id::ServerId, ()>::with_key();
        let mission = Mission {
            job: jobs.insert(()),
            store: jids[0],
            server: servers.insert(()),
            from: Location::default(),
            to: Location::default(),
        };

        agvs[ids[0]].push_mission(mission);
        let chosen = select_agv(AgvSelection::LeastWorkload, &agvs, Location::default());
        assert_eq!(chosen, Some(ids[1]));
    }

    // -----------------------------------------------------------------------
    // Test 5: NearestToSource measures from current positions
    // -----------------------------------------------------------------------
    #[test]
    fn nearest_to_source() {
        let (agvs, ids) = agv_map(&[(10, 10), (2, 1), (5, 5)]);
        let chosen = select_agv(AgvSelection::NearestToSource, &agvs, Location::new(0, 0));
        assert_eq!(chosen, Some(ids[1]));
    }

    // -----------------------------------------------------------------------
    // Test 6: Empty registries select nothing
    // -----------------------------------------------------------------------
    #[test]
    fn empty_registries() {
        let stores: SlotMap<StoreId, Store> = SlotMap::with_key();
        let agvs: SlotMap<AgvId, Agv> = SlotMap::with_key();

        assert!(select_store(StoreSelection::MostStock, &stores, ProductId(0), 1).is_none());
        assert!(select_agv(AgvSelection::LeastWorkload, &agvs, Location::default()).is_none());
    }
}
