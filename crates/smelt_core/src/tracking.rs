//! Per-station trackers and the versioned set that owns them.

use ahash::AHashMap;
use serde::Serialize;

use crate::{FuelLedger, Species, StationId, StationKind};

/// A station that reports "off" this many polls in a row is dropped.
pub const OFF_EVICTION_THRESHOLD: u32 = 50;

/// One convertible stack found in a station's input slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputStack {
    pub slot: usize,
    pub species: Species,
    pub amount: u32,
}

#[derive(Debug, Clone)]
pub struct Tracker {
    pub kind: StationKind,
    pub fuel_gated: bool,
    /// Scheduler clock (seconds) at which the next cycle may run.
    pub next_eligible: f64,
    pub cycles: u64,
    pub consecutive_off: u32,
    pub ledger: FuelLedger,
    /// Reused every cycle to avoid reallocating the input snapshot.
    pub(crate) inputs: Vec<InputStack>,
}

impl Tracker {
    pub fn new(kind: StationKind, now: f64) -> Self {
        Self {
            kind,
            fuel_gated: kind.is_fuel_gated(),
            next_eligible: now,
            cycles: 0,
            consecutive_off: 0,
            ledger: FuelLedger::default(),
            inputs: Vec::new(),
        }
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.next_eligible <= now
    }
}

/// Station id → tracker, with a version bumped on every insert and removal.
#[derive(Debug, Default)]
pub struct TrackingSet {
    trackers: AHashMap<StationId, Tracker>,
    version: u64,
}

impl TrackingSet {
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, id: StationId) -> bool {
        self.trackers.contains_key(&id)
    }

    pub fn get(&self, id: StationId) -> Option<&Tracker> {
        self.trackers.get(&id)
    }

    pub fn get_mut(&mut self, id: StationId) -> Option<&mut Tracker> {
        self.trackers.get_mut(&id)
    }

    /// Insert a tracker unless one already exists. Returns true if inserted.
    pub fn insert(&mut self, id: StationId, tracker: Tracker) -> bool {
        if self.trackers.contains_key(&id) {
            return false;
        }
        self.trackers.insert(id, tracker);
        self.version += 1;
        true
    }

    pub fn remove(&mut self, id: StationId) -> Option<Tracker> {
        let removed = self.trackers.remove(&id);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    /// Ids sorted for deterministic iteration.
    pub fn sorted_ids(&self) -> Vec<StationId> {
        let mut ids: Vec<StationId> = self.trackers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Ordered id snapshot the scheduler iterates; rebuilt only when the set's
/// version or length drifted.
#[derive(Debug, Default, Serialize)]
pub struct IdSnapshot {
    ids: Vec<StationId>,
    version: u64,
    len: usize,
}

impl IdSnapshot {
    /// Returns true if the snapshot was rebuilt.
    pub fn refresh(&mut self, set: &TrackingSet) -> bool {
        if self.version == set.version() && self.len == set.len() && !self.ids.is_empty() {
            return false;
        }
        self.ids = set.sorted_ids();
        self.version = set.version();
        self.len = set.len();
        true
    }

    pub fn ids(&self) -> &[StationId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
