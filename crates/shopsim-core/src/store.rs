//! Warehouse stores.
//!
//! A store couples bay capacity (how many withdrawals can be serviced at
//! once) with per-product inventory. A withdrawal acquires a bay, reserves
//! stock the moment its pick begins, holds for the sampled pick time, and
//! releases the bay when an AGV takes over. Stockout is a modeled delay:
//! the bay holder joins a FIFO waiter list and resumes when a deposit
//! covers its need. The head of the list blocks later waiters even when
//! those could be satisfied, so withdrawal order is honored exactly.
//!
//! Deposits arrive through a separate dock and never compete for bays;
//! otherwise a stockout waiter holding the last bay would shut the store
//! down for good.

use crate::agv::Location;
use crate::fixed::SimTime;
use crate::id::{JobId, ProductId};
use crate::rng::Sample;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Waiting records
// ---------------------------------------------------------------------------

/// A bay-holding withdrawal waiting for stock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockWait {
    pub job: JobId,
    pub product: ProductId,
    pub quantity: u32,
    pub since: SimTime,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A warehouse store: bays plus inventory.
#[derive(Debug)]
pub struct Store {
    pub name: String,
    pub bay_capacity: usize,
    pub pick_time: Sample,
    pub put_time: Sample,
    pub location: Location,

    /// On-hand, unreserved units per product. Never negative by construction.
    inventory: BTreeMap<ProductId, u32>,
    bays_in_use: usize,
    bay_queue: Vec<JobId>,
    stock_waiters: Vec<StockWait>,

    picks: u64,
    deposits: u64,
}

impl Store {
    pub fn new(name: impl Into<String>, bay_capacity: usize) -> Self {
        Self {
            name: name.into(),
            bay_capacity,
            pick_time: Sample::zero(),
            put_time: Sample::zero(),
            location: Location::default(),
            inventory: BTreeMap::new(),
            bays_in_use: 0,
            bay_queue: Vec::new(),
            stock_waiters: Vec::new(),
            picks: 0,
            deposits: 0,
        }
    }

    pub fn with_service_times(mut self, pick: Sample, put: Sample) -> Self {
        self.pick_time = pick;
        self.put_time = put;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_stock(mut self, product: ProductId, quantity: u32) -> Self {
        self.inventory.insert(product, quantity);
        self
    }

    // -----------------------------------------------------------------------
    // Bays
    // -----------------------------------------------------------------------

    /// Acquire a bay if one is free, otherwise join the FIFO bay queue.
    /// Returns `true` when the bay was granted immediately.
    pub fn acquire_bay(&mut self, job: JobId) -> bool {
        if self.bays_in_use < self.bay_capacity && self.bay_queue.is_empty() {
            self.bays_in_use += 1;
            true
        } else {
            self.bay_queue.push(job);
            false
        }
    }

    /// Release a bay and hand it to the next queued withdrawal, if any.
    pub fn release_bay(&mut self) -> Option<JobId> {
        debug_assert!(self.bays_in_use > 0);
        self.bays_in_use = self.bays_in_use.saturating_sub(1);
        if self.bay_queue.is_empty() {
            return None;
        }
        self.bays_in_use += 1;
        Some(self.bay_queue.remove(0))
    }

    pub fn bays_in_use(&self) -> usize {
        self.bays_in_use
    }

    pub fn bay_queue_len(&self) -> usize {
        self.bay_queue.len()
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    /// On-hand, unreserved units of a product.
    pub fn stock_of(&self, product: ProductId) -> u32 {
        self.inventory.get(&product).copied().unwrap_or(0)
    }

    /// Reserve stock for a pick that is starting now. Fails without side
    /// effects when the store is short.
    pub fn try_reserve(&mut self, product: ProductId, quantity: u32) -> bool {
        let on_hand = self.inventory.entry(product).or_insert(0);
        if *on_hand < quantity {
            return false;
        }
        *on_hand -= quantity;
        self.picks += 1;
        true
    }

    /// Apply a finished deposit.
    pub fn add_stock(&mut self, product: ProductId, quantity: u32) {
        *self.inventory.entry(product).or_insert(0) += quantity;
        self.deposits += 1;
    }

    // -----------------------------------------------------------------------
    // Stock waiters
    // -----------------------------------------------------------------------

    /// Park a bay-holding withdrawal until stock covers it.
    pub fn push_stock_waiter(&mut self, wait: StockWait) {
        self.stock_waiters.push(wait);
    }

    /// Resume the head waiter if current stock covers it, reserving the
    /// stock in the same step. The head blocks everyone behind it.
    pub fn pop_ready_waiter(&mut self) -> Option<StockWait> {
        let head = self.stock_waiters.first().copied()?;
        if !self.try_reserve(head.product, head.quantity) {
            return None;
        }
        Some(self.stock_waiters.remove(0))
    }

    pub fn stock_waiter_count(&self) -> usize {
        self.stock_waiters.len()
    }

    pub fn pick_count(&self) -> u64 {
        self.picks
    }

    pub fn deposit_count(&self) -> u64 {
        self.deposits
    }
}

// ===========================================================================
// Tests
// ===========================================================================
