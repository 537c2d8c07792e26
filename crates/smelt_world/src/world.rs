//! In-memory host: stations and actors the scheduler can drive.

use std::collections::BTreeMap;
use std::ops::Range;

use rand::Rng;
use serde::Serialize;
use smelt_core::host::{count_in, insert_into, remove_from};
use smelt_core::{
    ActivityEvent, ActivityKind, Actor, ActorId, HostError, ItemKind, ItemStack, PlayerMove,
    Scheduler, SlotStorage, SplitOutcome, Station, StationHost, StationId, StationKind, Storage,
    FUEL_ITEM,
};

pub const WORLD_STACK_LIMIT: u32 = 1000;
pub const ACTOR_SLOTS: usize = 30;

/// Slot layout of a buildable station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefab {
    pub short_name: &'static str,
    pub fuel: (usize, usize),
    pub input: (usize, usize),
    pub output: (usize, usize),
}

pub const PREFABS: [Prefab; 5] = [
    Prefab {
        short_name: "furnace",
        fuel: (0, 1),
        input: (1, 4),
        output: (4, 7),
    },
    Prefab {
        short_name: "furnace.large",
        fuel: (0, 2),
        input: (2, 17),
        output: (17, 32),
    },
    Prefab {
        short_name: "electric.furnace.deployed",
        fuel: (0, 0),
        input: (0, 2),
        output: (2, 4),
    },
    Prefab {
        short_name: "refinery_small_deployed",
        fuel: (0, 1),
        input: (1, 3),
        output: (3, 6),
    },
    Prefab {
        short_name: "campfire",
        fuel: (0, 1),
        input: (1, 3),
        output: (3, 5),
    },
];

pub fn prefab(short_name: &str) -> Option<&'static Prefab> {
    PREFABS.iter().find(|p| p.short_name == short_name)
}

// ---------------------------------------------------------------------------
// Stations and actors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorldStation {
    id: StationId,
    prefab: &'static Prefab,
    pub on: bool,
    pub storage: SlotStorage,
}

impl WorldStation {
    pub fn new(id: StationId, prefab: &'static Prefab) -> Self {
        Self {
            id,
            prefab,
            on: false,
            storage: SlotStorage::new(prefab.output.1, WORLD_STACK_LIMIT),
        }
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        count_in(&self.storage, 0..self.storage.slot_count(), kind)
    }

    fn has_power_or_fuel(&self) -> bool {
        let fuel = self.fuel_slots();
        fuel.is_empty() || count_in(&self.storage, fuel, FUEL_ITEM) > 0
    }
}

impl Station for WorldStation {
    fn id(&self) -> StationId {
        self.id
    }

    fn short_name(&self) -> &str {
        self.prefab.short_name
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn input_slots(&self) -> Range<usize> {
        self.prefab.input.0..self.prefab.input.1
    }

    fn fuel_slots(&self) -> Range<usize> {
        self.prefab.fuel.0..self.prefab.fuel.1
    }

    fn output_slots(&self) -> Range<usize> {
        self.prefab.output.0..self.prefab.output.1
    }

    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut dyn Storage {
        &mut self.storage
    }

    /// Lights the station if it has something to burn (or runs on power).
    fn force_start(&mut self) -> bool {
        if !self.on && self.has_power_or_fuel() {
            self.on = true;
        }
        self.on
    }
}

#[derive(Debug, Clone)]
pub struct WorldActor {
    id: ActorId,
    pub connected: bool,
    pub inventory: SlotStorage,
}

impl WorldActor {
    pub fn count(&self, kind: ItemKind) -> u32 {
        count_in(&self.inventory, 0..ACTOR_SLOTS, kind)
    }
}

impl Actor for WorldActor {
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

/// Something that happened in the world and that the scheduler should hear
/// about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    Activity(ActivityEvent),
    Move(PlayerMove),
}

#[derive(Debug, Clone, Serialize)]
pub struct StationSummary {
    pub id: StationId,
    pub short_name: String,
    pub kind: StationKind,
    pub on: bool,
    pub input: u32,
    pub fuel: u32,
    pub output: u32,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SimWorld {
    stations: BTreeMap<StationId, WorldStation>,
    actors: BTreeMap<ActorId, WorldActor>,
    next_station: u64,
    next_actor: u64,
}

impl SimWorld {
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn get_station(&self, id: StationId) -> Option<&WorldStation> {
        self.stations.get(&id)
    }

    pub fn get_actor(&self, id: ActorId) -> Option<&WorldActor> {
        self.actors.get(&id)
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    pub fn station_ids(&self) -> Vec<StationId> {
        self.stations.keys().copied().collect()
    }

    /// Place a new, switched-off station. Returns its id and the
    /// notification the host would raise.
    pub fn spawn_station(&mut self, prefab: &'static Prefab) -> (StationId, ActivityEvent) {
        self.next_station += 1;
        let id = StationId(self.next_station);
        self.stations.insert(id, WorldStation::new(id, prefab));
        let event = ActivityEvent {
            station: id,
            kind: ActivityKind::Discovered,
        };
        (id, event)
    }

    /// A connected actor carrying `items`, one stack per slot.
    pub fn spawn_actor(&mut self, items: &[(ItemKind, u32)]) -> Result<ActorId, HostError> {
        self.next_actor += 1;
        let id = ActorId(self.next_actor);
        let mut inventory = SlotStorage::new(ACTOR_SLOTS, WORLD_STACK_LIMIT);
        for &(kind, amount) in items {
            insert_into(&mut inventory, 0..ACTOR_SLOTS, kind, amount)?;
        }
        self.actors.insert(
            id,
            WorldActor {
                id,
                connected: true,
                inventory,
            },
        );
        Ok(id)
    }

    /// Load items straight into a station's slot range, bypassing players.
    pub fn stock(
        &mut self,
        id: StationId,
        kind: ItemKind,
        amount: u32,
        fuel: bool,
    ) -> Result<u32, HostError> {
        let station = self.stations.get_mut(&id).ok_or(HostError::StationGone(id))?;
        let range = if fuel {
            station.fuel_slots()
        } else {
            station.input_slots()
        };
        insert_into(&mut station.storage, range, kind, amount)
    }

    /// Switch a station on or off, the way a player would.
    pub fn toggle(&mut self, id: StationId, on: bool) -> Option<ActivityEvent> {
        let station = self.stations.get_mut(&id)?;
        if on {
            station.force_start();
        } else {
            station.on = false;
        }
        Some(ActivityEvent {
            station: id,
            kind: ActivityKind::Toggled,
        })
    }

    pub fn destroy(&mut self, id: StationId) -> Option<ActivityEvent> {
        self.stations.remove(&id).map(|_| ActivityEvent {
            station: id,
            kind: ActivityKind::Destroyed,
        })
    }

    /// Deliver a player move: the scheduler gets the first look, and if it
    /// does not redistribute the stack the world performs a plain move.
    pub fn apply_player_move(
        &mut self,
        scheduler: &mut Scheduler,
        mv: &PlayerMove,
    ) -> Result<SplitOutcome, HostError> {
        let outcome = scheduler.on_player_move(self, mv)?;
        if !matches!(outcome, SplitOutcome::Redistributed { .. }) {
            self.plain_move(mv)?;
        }
        Ok(outcome)
    }

    fn plain_move(&mut self, mv: &PlayerMove) -> Result<u32, HostError> {
        let station = self
            .stations
            .get_mut(&mv.station)
            .ok_or(HostError::StationGone(mv.station))?;
        let actor = self
            .actors
            .get_mut(&mv.actor)
            .ok_or(HostError::ActorGone(mv.actor))?;
        let target = mv.target_slot..mv.target_slot + 1;
        let wanted = mv.stack.amount.min(
            actor
                .inventory
                .get(mv.source_slot)
                .filter(|s| s.kind == mv.stack.kind)
                .map_or(0, |s| s.amount),
        );
        let placed = insert_into(&mut station.storage, target, mv.stack.kind, wanted)?;
        remove_from(
            &mut actor.inventory,
            mv.source_slot..mv.source_slot + 1,
            mv.stack.kind,
            placed,
        )?;
        Ok(placed)
    }

    pub fn summaries(&self, whitelist: &[String]) -> Vec<StationSummary> {
        self.stations
            .values()
            .map(|s| StationSummary {
                id: s.id,
                short_name: s.prefab.short_name.to_string(),
                kind: StationKind::classify(s.prefab.short_name, whitelist),
                on: s.on,
                input: s
                    .input_slots()
                    .filter_map(|slot| s.storage.get(slot))
                    .map(|stack| stack.amount)
                    .sum(),
                fuel: count_in(&s.storage, s.fuel_slots(), FUEL_ITEM),
                output: s
                    .output_slots()
                    .filter_map(|slot| s.storage.get(slot))
                    .map(|stack| stack.amount)
                    .sum(),
            })
            .collect()
    }

    /// One random thing a player might do: refill and drop ore into a
    /// station, or flip a station on or off.
    pub fn random_event(&mut self, rng: &mut impl Rng) -> Option<WorldEvent> {
        let ids = self.station_ids();
        if ids.is_empty() {
            return None;
        }
        let station = ids[rng.gen_range(0..ids.len())];
        if rng.gen_bool(0.2) {
            let on = !self.stations.get(&station)?.on;
            return self.toggle(station, on).map(WorldEvent::Activity);
        }

        let actors = self.actor_ids();
        if actors.is_empty() {
            return None;
        }
        let actor_id = actors[rng.gen_range(0..actors.len())];
        let target = self.stations.get(&station)?.input_slots();
        if target.is_empty() {
            return None;
        }
        let ore = if self.stations.get(&station)?.short_name().contains("refinery") {
            ItemKind::CrudeOil
        } else {
            ORES[rng.gen_range(0..ORES.len())]
        };
        let amount = rng.gen_range(20..=200);
        let actor = self.actors.get_mut(&actor_id)?;
        // Players restock from elsewhere between visits.
        actor.inventory.set(0, Some(ItemStack::new(ore, amount))).ok()?;
        if actor.count(FUEL_ITEM) < 200 {
            insert_into(&mut actor.inventory, 1..ACTOR_SLOTS, FUEL_ITEM, 500).ok()?;
        }
        Some(WorldEvent::Move(PlayerMove {
            actor: actor_id,
            station,
            source_slot: 0,
            target_slot: target.start,
            stack: ItemStack::new(ore, amount),
        }))
    }
}

const ORES: [ItemKind; 3] = [
    ItemKind::MetalOre,
    ItemKind::SulfurOre,
    ItemKind::HighQualityOre,
];

impl StationHost for SimWorld {
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
        self.station_ids()
    }
}
