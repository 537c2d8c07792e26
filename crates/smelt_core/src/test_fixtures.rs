//! Shared test fixtures for `smelt_core` and downstream crates.
//!
//! `station_with()` builds a station laid out like its kind with inputs and
//! fuel preloaded; `FixtureHost` holds stations and actors behind the
//! `StationHost` interface. `FixtureStorage::locked` makes chosen slots
//! refuse writes, for fault paths.

use std::collections::BTreeMap;
use std::ops::{Deref, Range};

use crate::host::{Actor, HostError, SlotStorage, Station, StationHost, Storage};
use crate::{ActorId, ItemKind, ItemStack, StationId, StationKind, FUEL_ITEM};

pub const FIXTURE_STACK_LIMIT: u32 = 1000;

/// `SlotStorage` whose `locked` slots reject every `set`.
#[derive(Debug, Clone)]
pub struct FixtureStorage {
    inner: SlotStorage,
    pub locked: Range<usize>,
}

impl FixtureStorage {
    pub fn new(slot_count: usize) -> Self {
        Self {
            inner: SlotStorage::new(slot_count, FIXTURE_STACK_LIMIT),
            locked: 0..0,
        }
    }
}

impl Deref for FixtureStorage {
    type Target = SlotStorage;

    fn deref(&self) -> &SlotStorage {
        &self.inner
    }
}

impl Storage for FixtureStorage {
    fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    fn get(&self, slot: usize) -> Option<ItemStack> {
        self.inner.get(slot)
    }

    fn set(&mut self, slot: usize, stack: Option<ItemStack>) -> Result<(), HostError> {
        if self.locked.contains(&slot) {
            return Err(HostError::SlotLocked { slot });
        }
        self.inner.set(slot, stack)
    }

    fn max_stack(&self, kind: ItemKind) -> u32 {
        self.inner.max_stack(kind)
    }
}

/// Slot layout `(fuel, input, output)` per station kind.
pub fn layout(kind: StationKind) -> (Range<usize>, Range<usize>, Range<usize>) {
    match kind {
        StationKind::SmallFurnace => (0..1, 1..4, 4..7),
        StationKind::LargeFurnace => (0..2, 2..8, 8..14),
        StationKind::ElectricFurnace => (0..0, 0..2, 2..4),
        StationKind::SmallRefinery => (0..1, 1..3, 3..6),
        StationKind::Unknown => (0..0, 0..0, 0..0),
    }
}

pub fn short_name(kind: StationKind) -> &'static str {
    match kind {
        StationKind::SmallFurnace => "furnace",
        StationKind::LargeFurnace => "furnace.large",
        StationKind::ElectricFurnace => "electricfurnace.deployed",
        StationKind::SmallRefinery => "refinery_small_deployed",
        StationKind::Unknown => "campfire",
    }
}

#[derive(Debug, Clone)]
pub struct FixtureStation {
    pub id: StationId,
    pub name: String,
    pub on: bool,
    pub storage: FixtureStorage,
    pub fuel: Range<usize>,
    pub input: Range<usize>,
    pub output: Range<usize>,
    pub force_starts: u32,
}

impl FixtureStation {
    pub fn new(id: StationId, kind: StationKind) -> Self {
        let (fuel, input, output) = layout(kind);
        Self {
            id,
            name: short_name(kind).to_string(),
            on: true,
            storage: FixtureStorage::new(output.end),
            fuel,
            input,
            output,
            force_starts: 0,
        }
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        self.storage
            .slots()
            .iter()
            .flatten()
            .filter(|s| s.kind == kind)
            .map(|s| s.amount)
            .sum()
    }

    pub fn put(&mut self, slot: usize, kind: ItemKind, amount: u32) {
        self.storage
            .set(slot, Some(ItemStack::new(kind, amount)))
            .unwrap();
    }

    pub fn fill_outputs(&mut self, kind: ItemKind) {
        for slot in self.output.clone() {
            self.put(slot, kind, FIXTURE_STACK_LIMIT);
        }
    }

    /// Leave exactly `room` free units of `kind` in the first output slot.
    pub fn free_output_room(&mut self, kind: ItemKind, room: u32) {
        let slot = self.output.start;
        self.put(slot, kind, FIXTURE_STACK_LIMIT - room);
    }
}

/// Station of `kind` with `inputs` placed in consecutive input slots and
/// `fuel` wood spread over its fuel slots.
pub fn station_with(kind: StationKind, inputs: &[(ItemKind, u32)], fuel: u32) -> FixtureStation {
    let mut station = FixtureStation::new(StationId(1), kind);
    for (slot, (item, amount)) in station.input.clone().zip(inputs) {
        station.put(slot, *item, *amount);
    }
    let mut remaining = fuel;
    for slot in station.fuel.clone() {
        let here = remaining.min(FIXTURE_STACK_LIMIT);
        if here > 0 {
            station.put(slot, FUEL_ITEM, here);
        }
        remaining -= here;
    }
    station
}

impl Station for FixtureStation {
    fn id(&self) -> StationId {
        self.id
    }

    fn short_name(&self) -> &str {
        &self.name
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn input_slots(&self) -> Range<usize> {
        self.input.clone()
    }

    fn fuel_slots(&self) -> Range<usize> {
        self.fuel.clone()
    }

    fn output_slots(&self) -> Range<usize> {
        self.output.clone()
    }

    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut dyn Storage {
        &mut self.storage
    }

    fn force_start(&mut self) -> bool {
        self.force_starts += 1;
        self.on = true;
        true
    }
}

#[derive(Debug, Clone)]
pub struct FixtureActor {
    pub id: ActorId,
    pub connected: bool,
    pub inventory: FixtureStorage,
}

impl FixtureActor {
    pub fn new(id: ActorId, items: &[(ItemKind, u32)]) -> Self {
        let mut inventory = FixtureStorage::new(24);
        for (slot, (kind, amount)) in items.iter().enumerate() {
            inventory
                .set(slot, Some(ItemStack::new(*kind, *amount)))
                .unwrap();
        }
        Self {
            id,
            connected: true,
            inventory,
        }
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        crate::host::count_in(&self.inventory, 0..self.inventory.slot_count(), kind)
    }
}

impl Actor for FixtureActor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn inventory(&self) -> &dyn Storage {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut dyn Storage {
        &mut self.inventory
    }
}

#[derive(Debug, Default)]
pub struct FixtureHost {
    pub stations: BTreeMap<StationId, FixtureStation>,
    pub actors: BTreeMap<ActorId, FixtureActor>,
}

impl FixtureHost {
    /// `count` small furnaces with ids `1..=count`, each loaded with metal
    /// ore and plenty of wood.
    pub fn with_furnaces(count: u64) -> Self {
        let mut host = Self::default();
        for n in 1..=count {
            let mut station =
                station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 1000)], 1000);
            station.id = StationId(n);
            host.stations.insert(station.id, station);
        }
        host
    }

    pub fn add_station(&mut self, station: FixtureStation) {
        self.stations.insert(station.id, station);
    }

    pub fn add_actor(&mut self, actor: FixtureActor) {
        self.actors.insert(actor.id, actor);
    }
}

impl StationHost for FixtureHost {
    fn station_mut(&mut self, id: StationId) -> Option<&mut dyn Station> {
        self.stations.get_mut(&id).map(|s| s as &mut dyn Station)
    }

    fn station_and_actor_mut(
        &mut self,
        station: StationId,
        actor: ActorId,
    ) -> Option<(&mut dyn Station, &mut dyn Actor)> {
        let station = self.stations.get_mut(&station)?;
        let actor = self.actors.get_mut(&actor)?;
        Some((station as &mut dyn Station, actor as &mut dyn Actor))
    }

    fn discover(&self) -> Vec<StationId> {
        self.stations.keys().copied().collect()
    }
}
