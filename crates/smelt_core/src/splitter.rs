//! Even redistribution of ore a player drops into a station.

use serde::Serialize;

use crate::host::{count_in, even_split, HostError, SlotJournal, StationHost};
use crate::{ItemStack, PlayerMove, StationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SplitOutcome {
    /// Not a convertible stack for this station, not aimed at an input
    /// slot, or no room left. The host handles the move as usual.
    NotApplicable,
    /// Another item already occupies an input slot; the player's placement
    /// is left alone.
    Refused,
    /// `moved` units were taken from the actor and spread over the inputs.
    Redistributed { moved: u32 },
}

/// Spread the moved stack, together with whatever of the same kind is
/// already there, evenly across the station's input slots.
pub fn split_move(
    host: &mut dyn StationHost,
    mv: &PlayerMove,
    whitelist: &[String],
) -> Result<SplitOutcome, HostError> {
    let Some((station, actor)) = host.station_and_actor_mut(mv.station, mv.actor) else {
        return Ok(SplitOutcome::NotApplicable);
    };
    let kind = StationKind::classify(station.short_name(), whitelist);
    let item = mv.stack.kind;
    let Some(species) = item.species() else {
        return Ok(SplitOutcome::NotApplicable);
    };
    let inputs = station.input_slots();
    if !kind.accepts(species) || !inputs.contains(&mv.target_slot) {
        return Ok(SplitOutcome::NotApplicable);
    }

    let storage = station.storage_mut();
    let inputs = inputs.start..inputs.end.min(storage.slot_count());
    if inputs.clone().any(|slot| storage.get(slot).is_some_and(|s| s.kind != item)) {
        return Ok(SplitOutcome::Refused);
    }

    let incoming = match actor.inventory().get(mv.source_slot) {
        Some(stack) if stack.kind == item => stack.amount.min(mv.stack.amount),
        _ => return Ok(SplitOutcome::NotApplicable),
    };
    let slot_count = inputs.len();
    let existing = count_in(storage, inputs.clone(), item);
    let max_total = storage
        .max_stack(item)
        .saturating_mul(u32::try_from(slot_count).unwrap_or(u32::MAX));
    let desired = existing.saturating_add(incoming).min(max_total);
    let moved = desired.saturating_sub(existing);
    if moved == 0 {
        return Ok(SplitOutcome::NotApplicable);
    }

    let mut journal = SlotJournal::default();
    for (slot, share) in inputs.zip(even_split(desired, slot_count)) {
        let stack = (share > 0).then(|| ItemStack::new(item, share));
        if let Err(err) = journal.set(storage, slot, stack) {
            journal.rollback(storage);
            return Err(err);
        }
    }

    let source = actor.inventory_mut();
    let left = source
        .get(mv.source_slot)
        .map_or(0, |s| s.amount.saturating_sub(moved));
    if let Err(err) = source.set(mv.source_slot, (left > 0).then(|| ItemStack::new(item, left))) {
        journal.rollback(storage);
        return Err(err);
    }

    tracing::debug!(station = %mv.station, actor = %mv.actor, moved, "split ore across inputs");
    Ok(SplitOutcome::Redistributed { moved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{station_with, FixtureActor, FixtureHost};
    use crate::host::Storage;
    use crate::{ActorId, ItemKind, SmeltConfig, StationId};

    fn host_with(station_inputs: &[(ItemKind, u32)], carried: u32) -> FixtureHost {
        let mut host = FixtureHost::default();
        host.add_station(station_with(StationKind::SmallFurnace, station_inputs, 0));
        host.add_actor(FixtureActor::new(
            ActorId(7),
            &[(ItemKind::MetalOre, carried)],
        ));
        host
    }

    fn ore_move(amount: u32) -> PlayerMove {
        PlayerMove {
            actor: ActorId(7),
            station: StationId(1),
            source_slot: 0,
            target_slot: 1,
            stack: ItemStack::new(ItemKind::MetalOre, amount),
        }
    }

    #[test]
    fn hundred_ore_splits_34_33_33() {
        let mut host = host_with(&[], 100);
        let whitelist = SmeltConfig::default().station_whitelist;

        let outcome = split_move(&mut host, &ore_move(100), &whitelist).unwrap();

        assert_eq!(outcome, SplitOutcome::Redistributed { moved: 100 });
        let station = &host.stations[&StationId(1)];
        let amounts: Vec<u32> = (1..4)
            .map(|slot| station.storage.slots()[slot].map_or(0, |s| s.amount))
            .collect();
        assert_eq!(amounts, vec![34, 33, 33]);
        assert_eq!(host.actors[&ActorId(7)].count(ItemKind::MetalOre), 0);
    }

    #[test]
    fn existing_ore_is_rebalanced_with_incoming() {
        let mut host = host_with(&[(ItemKind::MetalOre, 50)], 40);
        let whitelist = SmeltConfig::default().station_whitelist;

        split_move(&mut host, &ore_move(40), &whitelist).unwrap();

        let station = &host.stations[&StationId(1)];
        assert_eq!(station.count(ItemKind::MetalOre), 90);
        for slot in 1..4 {
            assert_eq!(station.storage.slots()[slot].map(|s| s.amount), Some(30));
        }
    }

    #[test]
    fn other_species_in_inputs_refuses() {
        let mut host = host_with(&[(ItemKind::SulfurOre, 10)], 100);
        let whitelist = SmeltConfig::default().station_whitelist;

        let outcome = split_move(&mut host, &ore_move(100), &whitelist).unwrap();

        assert_eq!(outcome, SplitOutcome::Refused);
        assert_eq!(host.actors[&ActorId(7)].count(ItemKind::MetalOre), 100);
    }

    #[test]
    fn split_is_capped_by_input_capacity() {
        let mut host = host_with(&[(ItemKind::MetalOre, 1000), (ItemKind::MetalOre, 1000)], 1000);
        let whitelist = SmeltConfig::default().station_whitelist;

        let outcome = split_move(&mut host, &ore_move(1000), &whitelist).unwrap();

        assert_eq!(outcome, SplitOutcome::Redistributed { moved: 1000 });
        let actor = host.actors.get_mut(&ActorId(7)).unwrap();
        actor
            .inventory
            .set(0, Some(ItemStack::new(ItemKind::MetalOre, 10)))
            .unwrap();
        let again = split_move(&mut host, &ore_move(10), &whitelist).unwrap();
        assert_eq!(again, SplitOutcome::NotApplicable);
    }

    #[test]
    fn move_into_fuel_slot_is_not_split() {
        let mut host = host_with(&[], 100);
        let whitelist = SmeltConfig::default().station_whitelist;
        let mut mv = ore_move(100);
        mv.target_slot = 0;
        assert_eq!(
            split_move(&mut host, &mv, &whitelist).unwrap(),
            SplitOutcome::NotApplicable
        );
    }

    #[test]
    fn refused_source_write_restores_inputs() {
        let mut host = host_with(&[(ItemKind::MetalOre, 50)], 40);
        host.actors.get_mut(&ActorId(7)).unwrap().inventory.locked = 0..1;
        let whitelist = SmeltConfig::default().station_whitelist;

        let result = split_move(&mut host, &ore_move(40), &whitelist);

        assert_eq!(result, Err(HostError::SlotLocked { slot: 0 }));
        let station = &host.stations[&StationId(1)];
        assert_eq!(station.count(ItemKind::MetalOre), 50, "no ore duplicated");
        assert_eq!(station.storage.get(1), Some(ItemStack::new(ItemKind::MetalOre, 50)));
        assert_eq!(host.actors[&ActorId(7)].count(ItemKind::MetalOre), 40);
    }
}
