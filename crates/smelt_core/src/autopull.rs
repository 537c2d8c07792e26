//! Top up a station's fuel from the actor who just loaded it.

use crate::host::{
    count_in, even_split, remove_from, room_for, Actor, HostError, SlotJournal, Station,
};
use crate::{ItemStack, StationKind, FUEL_ITEM};

/// Fuel needed to convert everything currently in the input slots, with
/// `buffer_percent` extra, rounded up.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // ceil of a clamped non-negative value
pub fn required_fuel(station: &dyn Station, kind: StationKind, buffer_percent: f64) -> u32 {
    let storage = station.storage();
    let range = station.input_slots();
    let end = range.end.min(storage.slot_count());
    let base: f64 = (range.start..end)
        .filter_map(|slot| storage.get(slot))
        .filter_map(|stack| {
            let species = stack.kind.species()?;
            kind.accepts(species)
                .then(|| f64::from(stack.amount) * species.fuel_per_unit())
        })
        .sum();
    let buffer = buffer_percent.clamp(0.0, 10.0) / 100.0;
    // Trim float noise so exact multiples do not round up an extra unit.
    (base * (1.0 + buffer) - 1e-9)
        .ceil()
        .clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Pull the missing fuel from `actor` into the station's fuel slots.
/// Returns the amount moved.
pub fn pull_fuel(
    station: &mut dyn Station,
    actor: &mut dyn Actor,
    kind: StationKind,
    buffer_percent: f64,
) -> Result<u32, HostError> {
    if !actor.is_connected() || !kind.is_fuel_gated() {
        return Ok(0);
    }

    let station_id = station.id();
    let fuel_range = station.fuel_slots();
    let present = count_in(station.storage(), fuel_range.clone(), FUEL_ITEM);
    let delta = required_fuel(station, kind, buffer_percent).saturating_sub(present);
    if delta == 0 {
        return Ok(0);
    }
    let inventory_slots = 0..actor.inventory().slot_count();
    let carried = count_in(actor.inventory(), inventory_slots.clone(), FUEL_ITEM);
    let want = delta.min(carried);
    if want == 0 {
        return Ok(0);
    }

    let storage = station.storage_mut();
    let end = fuel_range
        .start
        .saturating_add(kind.fuel_slot_count())
        .min(fuel_range.end)
        .min(storage.slot_count());
    let slots = fuel_range.start..end;
    let shares: Vec<(usize, u32)> = slots
        .clone()
        .zip(even_split(want, slots.len()))
        .map(|(slot, share)| (slot, share.min(room_for(storage, slot..slot + 1, FUEL_ITEM))))
        .collect();
    let total: u32 = shares.iter().map(|(_, share)| share).sum();
    if total == 0 {
        return Ok(0);
    }

    // The station is written first; fuel leaves the actor only once it
    // has somewhere to go.
    let mut journal = SlotJournal::default();
    for (slot, share) in shares {
        if share == 0 {
            continue;
        }
        let topped = storage.get(slot).map_or(0, |s| s.amount) + share;
        if let Err(err) = journal.set(storage, slot, Some(ItemStack::new(FUEL_ITEM, topped))) {
            journal.rollback(storage);
            return Err(err);
        }
    }
    let taken = match remove_from(actor.inventory_mut(), inventory_slots, FUEL_ITEM, total) {
        Ok(taken) => taken,
        Err(err) => {
            journal.rollback(storage);
            return Err(err);
        }
    };
    if taken < total {
        remove_from(storage, slots, FUEL_ITEM, total - taken)?;
    }

    tracing::debug!(station = %station_id, actor = %actor.id(), pulled = taken, "auto-pulled fuel");
    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{station_with, FixtureActor};
    use crate::{ActorId, ItemKind};

    fn carrier(wood: u32) -> FixtureActor {
        FixtureActor::new(ActorId(7), &[(FUEL_ITEM, wood)])
    }

    #[test]
    fn required_fuel_covers_inputs_plus_buffer() {
        let station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 0);
        // 90 * 5/3 = 150, +5% = 157.5
        assert_eq!(required_fuel(&station, StationKind::SmallFurnace, 5.0), 158);
        assert_eq!(required_fuel(&station, StationKind::SmallFurnace, 0.0), 150);
    }

    #[test]
    fn exact_multiple_does_not_round_up() {
        let station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 30)], 0);
        assert_eq!(required_fuel(&station, StationKind::SmallFurnace, 0.0), 50);
    }

    #[test]
    fn pulls_missing_fuel_into_small_furnace() {
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 0);
        let mut actor = carrier(200);

        let pulled = pull_fuel(&mut station, &mut actor, StationKind::SmallFurnace, 5.0).unwrap();

        assert_eq!(pulled, 158);
        assert_eq!(station.count(FUEL_ITEM), 158);
        assert_eq!(actor.count(FUEL_ITEM), 42);
    }

    #[test]
    fn existing_fuel_reduces_the_pull() {
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 100);
        let mut actor = carrier(200);

        let pulled = pull_fuel(&mut station, &mut actor, StationKind::SmallFurnace, 5.0).unwrap();

        assert_eq!(pulled, 58);
        assert_eq!(station.count(FUEL_ITEM), 158);
    }

    #[test]
    fn large_furnace_splits_across_two_fuel_slots() {
        let mut station = station_with(StationKind::LargeFurnace, &[(ItemKind::MetalOre, 60)], 0);
        let mut actor = carrier(500);

        let pulled = pull_fuel(&mut station, &mut actor, StationKind::LargeFurnace, 5.0).unwrap();

        assert_eq!(pulled, 105);
        assert_eq!(station.storage.slots()[0].map(|s| s.amount), Some(53));
        assert_eq!(station.storage.slots()[1].map(|s| s.amount), Some(52));
        assert_eq!(actor.count(FUEL_ITEM), 395);
    }

    #[test]
    fn short_actor_gives_what_it_has() {
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 0);
        let mut actor = carrier(20);

        let pulled = pull_fuel(&mut station, &mut actor, StationKind::SmallFurnace, 5.0).unwrap();

        assert_eq!(pulled, 20);
        assert_eq!(actor.count(FUEL_ITEM), 0);
    }

    #[test]
    fn refinery_fuel_follows_crude_rate() {
        let station = station_with(StationKind::SmallRefinery, &[(ItemKind::CrudeOil, 30)], 0);
        assert_eq!(required_fuel(&station, StationKind::SmallRefinery, 0.0), 50);
    }

    #[test]
    fn disconnected_actor_or_electric_station_pulls_nothing() {
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 0);
        let mut actor = carrier(200);
        actor.connected = false;
        assert_eq!(
            pull_fuel(&mut station, &mut actor, StationKind::SmallFurnace, 5.0).unwrap(),
            0
        );

        let mut electric =
            station_with(StationKind::ElectricFurnace, &[(ItemKind::MetalOre, 90)], 0);
        let mut actor = carrier(200);
        assert_eq!(
            pull_fuel(&mut electric, &mut actor, StationKind::ElectricFurnace, 5.0).unwrap(),
            0
        );
        assert_eq!(actor.count(FUEL_ITEM), 200);
    }

    #[test]
    fn refused_actor_write_leaves_station_unfuelled() {
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::MetalOre, 90)], 0);
        let mut actor = carrier(200);
        actor.inventory.locked = 0..24;

        let result = pull_fuel(&mut station, &mut actor, StationKind::SmallFurnace, 5.0);

        assert!(result.is_err());
        assert_eq!(station.count(FUEL_ITEM), 0);
        assert_eq!(actor.count(FUEL_ITEM), 200);
    }

    #[test]
    fn refused_fuel_slot_keeps_actor_fuel() {
        let mut station = station_with(StationKind::LargeFurnace, &[(ItemKind::MetalOre, 60)], 0);
        station.storage.locked = 1..2;
        let mut actor = carrier(500);

        let result = pull_fuel(&mut station, &mut actor, StationKind::LargeFurnace, 5.0);

        assert_eq!(result, Err(HostError::SlotLocked { slot: 1 }));
        assert_eq!(station.count(FUEL_ITEM), 0, "first slot rolled back");
        assert_eq!(actor.count(FUEL_ITEM), 500);
    }
}
