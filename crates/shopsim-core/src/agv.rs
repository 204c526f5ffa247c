//! Automated guided vehicles.
//!
//! An AGV carries one delivery at a time (capacity is fixed at 1). Missions
//! queue per vehicle; the engine drives the load / travel / unload phases
//! through clock wakes and the AGV only tracks status, position, and
//! counters.

use crate::fixed::{Duration, Fixed64};
use crate::id::{JobId, ServerId, StoreId};
use crate::rng::Sample;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// A position on the shop-floor grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance in grid cells.
    pub fn distance(self, other: Location) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

// ---------------------------------------------------------------------------
// Travel models
// ---------------------------------------------------------------------------

/// How long a delivery takes, enum-dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TravelModel {
    /// Every mission travels for the same total duration, positions ignored.
    Fixed(Duration),
    /// Per-leg: Manhattan cells times `time_per_cell`, current position to
    /// the store plus store to the destination server.
    Manhattan { time_per_cell: Duration },
}

impl TravelModel {
    /// Total travel duration of a mission starting from `at`.
    pub fn travel_duration(&self, at: Location, from: Location, to: Location) -> Duration {
        match self {
            TravelModel::Fixed(d) => *d,
            TravelModel::Manhattan { time_per_cell } => {
                let cells = at.distance(from) + from.distance(to);
                Fixed64::from_num(cells as i64) * *time_per_cell
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Missions and status
// ---------------------------------------------------------------------------

/// One delivery: picked material from a store to a job waiting at a server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mission {
    pub job: JobId,
    pub store: StoreId,
    pub server: ServerId,
    pub from: Location,
    pub to: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgvStatus {
    Idle,
    Loading,
    Traveling,
    Unloading,
}

// ---------------------------------------------------------------------------
// Agv
// ---------------------------------------------------------------------------

/// A transport vehicle. Missions it has not started yet wait in its queue.
#[derive(Debug)]
pub struct Agv {
    pub name: String,
    pub travel: TravelModel,
    pub load_time: Sample,
    pub unload_time: Sample,

    location: Location,
    status: AgvStatus,
    active: Option<Mission>,
    queue: Vec<Mission>,
    travel_time: Duration,
    trips: u64,
}

impl Agv {
    pub fn new(name: impl Into<String>, travel: TravelModel) -> Self {
        Self {
            name: name.into(),
            travel,
            load_time: Sample::zero(),
            unload_time: Sample::zero(),
            location: Location::default(),
            status: AgvStatus::Idle,
            active: None,
            queue: Vec::new(),
            travel_time: Duration::ZERO,
            trips: 0,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_handling_times(mut self, load: Sample, unload: Sample) -> Self {
        self.load_time = load;
        self.unload_time = unload;
        self
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn status(&self) -> AgvStatus {
        self.status
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgvStatus::Idle
    }

    /// Queued plus active missions. The least-workload selection key.
    pub fn backlog(&self) -> usize {
        self.queue.len() + usize::from(self.active.is_some())
    }

    pub fn push_mission(&mut self, mission: Mission) {
        self.queue.push(mission);
    }

    /// Take the next queued mission and enter the loading phase. Returns
    /// `None` while busy or out of work.
    pub fn begin_next_mission(&mut self) -> Option<Mission> {
        if self.status != AgvStatus::Idle || self.queue.is_empty() {
            return None;
        }
        let mission = self.queue.remove(0);
        self.active = Some(mission);
        self.status = AgvStatus::Loading;
        Some(mission)
    }

    /// Loading finished; compute and account the travel leg.
    pub fn begin_travel(&mut self) -> Option<Duration> {
        let mission = self.active?;
        let duration = self
            .travel
            .travel_duration(self.location, mission.from, mission.to);
        self.status = AgvStatus::Traveling;
        self.travel_time += duration;
        Some(duration)
    }

    /// Arrived at the destination server.
    pub fn begin_unloading(&mut self) {
        if let Some(mission) = self.active {
            self.location = mission.to;
            self.status = AgvStatus::Unloading;
        }
    }

    /// Unloading finished; the vehicle is free again.
    pub fn finish_mission(&mut self) -> Option<Mission> {
        let mission = self.active.take();
        if mission.is_some() {
            self.status = AgvStatus::Idle;
            self.trips += 1;
        }
        mission
    }

    pub fn total_travel_time(&self) -> Duration {
        self.travel_time
    }

    pub fn trip_count(&self) -> u64 {
        self.trips
    }
}

// ===========================================================================
// Tests
// ===========================================================================
