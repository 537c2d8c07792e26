//! Interfaces to the host simulation.
//!
//! The core never owns stations or actors. It reaches them through these
//! traits, and only for the duration of one call.

use std::ops::Range;

use smallvec::SmallVec;
use thiserror::Error;

use crate::{ActorId, ItemKind, ItemStack, StationId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("slot {slot} is out of range (storage has {len} slots)")]
    SlotOutOfRange { slot: usize, len: usize },
    #[error("stack of {amount} {kind:?} exceeds the stack limit of {limit}")]
    StackOverflow {
        kind: ItemKind,
        amount: u32,
        limit: u32,
    },
    #[error("slot {slot} refused the write")]
    SlotLocked { slot: usize },
    #[error("station {0} is no longer available")]
    StationGone(StationId),
    #[error("actor {0} is no longer available")]
    ActorGone(ActorId),
}

/// Slot storage of a station or an actor's carried inventory.
pub trait Storage {
    fn slot_count(&self) -> usize;
    fn get(&self, slot: usize) -> Option<ItemStack>;
    fn set(&mut self, slot: usize, stack: Option<ItemStack>) -> Result<(), HostError>;
    fn max_stack(&self, kind: ItemKind) -> u32;
}

pub trait Station {
    fn id(&self) -> StationId;
    /// Prefab-style short name used for kind classification.
    fn short_name(&self) -> &str;
    fn is_on(&self) -> bool;
    fn input_slots(&self) -> Range<usize>;
    fn fuel_slots(&self) -> Range<usize>;
    fn output_slots(&self) -> Range<usize>;
    fn storage(&self) -> &dyn Storage;
    fn storage_mut(&mut self) -> &mut dyn Storage;

    /// Ask the host to kick the station's native processing into motion.
    /// Hosts without such a hook keep the default.
    fn force_start(&mut self) -> bool {
        false
    }
}

pub trait Actor {
    fn id(&self) -> ActorId;
    fn is_connected(&self) -> bool;
    fn inventory(&self) -> &dyn Storage;
    fn inventory_mut(&mut self) -> &mut dyn Storage;
}

pub trait StationHost {
    fn station_mut(&mut self, id: StationId) -> Option<&mut dyn Station>;
    /// Borrow a station and an actor at the same time.
    fn station_and_actor_mut(
        &mut self,
        station: StationId,
        actor: ActorId,
    ) -> Option<(&mut dyn Station, &mut dyn Actor)>;
    /// Enumerate every station currently loaded.
    fn discover(&self) -> Vec<StationId>;
}

// ---------------------------------------------------------------------------
// Vec-backed storage
// ---------------------------------------------------------------------------

/// Plain `Vec<Option<ItemStack>>` storage with a uniform stack limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStorage {
    slots: Vec<Option<ItemStack>>,
    stack_limit: u32,
}

impl SlotStorage {
    pub fn new(slot_count: usize, stack_limit: u32) -> Self {
        Self {
            slots: vec![None; slot_count],
            stack_limit,
        }
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }
}

impl Storage for SlotStorage {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).copied().flatten()
    }

    fn set(&mut self, slot: usize, stack: Option<ItemStack>) -> Result<(), HostError> {
        let len = self.slots.len();
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(HostError::SlotOutOfRange { slot, len })?;
        match stack {
            Some(s) if s.amount > self.stack_limit => Err(HostError::StackOverflow {
                kind: s.kind,
                amount: s.amount,
                limit: self.stack_limit,
            }),
            Some(s) if s.amount == 0 => {
                *entry = None;
                Ok(())
            }
            other => {
                *entry = other;
                Ok(())
            }
        }
    }

    fn max_stack(&self, _kind: ItemKind) -> u32 {
        self.stack_limit
    }
}

// ---------------------------------------------------------------------------
// Slot-range helpers
// ---------------------------------------------------------------------------

fn clamp_range(storage: &dyn Storage, range: Range<usize>) -> Range<usize> {
    let len = storage.slot_count();
    range.start.min(len)..range.end.min(len)
}

/// Total amount of `kind` held in `range`.
pub fn count_in(storage: &dyn Storage, range: Range<usize>, kind: ItemKind) -> u32 {
    clamp_range(storage, range)
        .filter_map(|slot| storage.get(slot))
        .filter(|stack| stack.kind == kind)
        .map(|stack| stack.amount)
        .sum()
}

/// How many more units of `kind` fit in `range`, counting both top-ups of
/// existing stacks and empty slots.
pub fn room_for(storage: &dyn Storage, range: Range<usize>, kind: ItemKind) -> u32 {
    let limit = storage.max_stack(kind);
    clamp_range(storage, range)
        .map(|slot| match storage.get(slot) {
            None => limit,
            Some(stack) if stack.kind == kind => limit.saturating_sub(stack.amount),
            Some(_) => 0,
        })
        .fold(0_u32, u32::saturating_add)
}

/// Slot values saved before each write, so a multi-slot change that fails
/// partway can be put back.
#[derive(Debug, Default)]
pub(crate) struct SlotJournal {
    saved: SmallVec<[(usize, Option<ItemStack>); 8]>,
}

impl SlotJournal {
    pub(crate) fn set(
        &mut self,
        storage: &mut dyn Storage,
        slot: usize,
        stack: Option<ItemStack>,
    ) -> Result<(), HostError> {
        let previous = storage.get(slot);
        storage.set(slot, stack)?;
        self.saved.push((slot, previous));
        Ok(())
    }

    /// Restore every recorded slot, newest first.
    pub(crate) fn rollback(self, storage: &mut dyn Storage) {
        for (slot, previous) in self.saved.into_iter().rev() {
            if let Err(err) = storage.set(slot, previous) {
                tracing::warn!(slot, error = %err, "could not restore slot");
            }
        }
    }
}

/// Insert up to `amount` of `kind` into `range`, topping up existing stacks
/// before filling empty slots. Returns the amount actually inserted. On error
/// the storage is left as it was.
pub fn insert_into(
    storage: &mut dyn Storage,
    range: Range<usize>,
    kind: ItemKind,
    amount: u32,
) -> Result<u32, HostError> {
    let mut journal = SlotJournal::default();
    match insert_journaled(storage, &mut journal, range, kind, amount) {
        Ok(inserted) => Ok(inserted),
        Err(err) => {
            journal.rollback(storage);
            Err(err)
        }
    }
}

fn insert_journaled(
    storage: &mut dyn Storage,
    journal: &mut SlotJournal,
    range: Range<usize>,
    kind: ItemKind,
    amount: u32,
) -> Result<u32, HostError> {
    let range = clamp_range(storage, range);
    let limit = storage.max_stack(kind);
    let mut remaining = amount;

    for slot in range.clone() {
        if remaining == 0 {
            break;
        }
        if let Some(stack) = storage.get(slot) {
            if stack.kind == kind && stack.amount < limit {
                let add = remaining.min(limit - stack.amount);
                journal.set(storage, slot, Some(ItemStack::new(kind, stack.amount + add)))?;
                remaining -= add;
            }
        }
    }
    for slot in range {
        if remaining == 0 {
            break;
        }
        if storage.get(slot).is_none() {
            let add = remaining.min(limit);
            journal.set(storage, slot, Some(ItemStack::new(kind, add)))?;
            remaining -= add;
        }
    }
    Ok(amount - remaining)
}

/// Remove up to `amount` of `kind` from `range`, earliest slots first.
/// Returns the amount actually removed. On error the storage is left as it
/// was.
pub fn remove_from(
    storage: &mut dyn Storage,
    range: Range<usize>,
    kind: ItemKind,
    amount: u32,
) -> Result<u32, HostError> {
    let mut journal = SlotJournal::default();
    let mut remaining = amount;
    for slot in clamp_range(storage, range) {
        if remaining == 0 {
            break;
        }
        let Some(stack) = storage.get(slot).filter(|s| s.kind == kind) else {
            continue;
        };
        let take = remaining.min(stack.amount);
        let left = stack.amount - take;
        if let Err(err) = journal.set(storage, slot, (left > 0).then(|| ItemStack::new(kind, left)))
        {
            journal.rollback(storage);
            return Err(err);
        }
        remaining -= take;
    }
    Ok(amount - remaining)
}

/// Split `total` across `n` parts, remainder going to the earliest parts.
pub fn even_split(total: u32, n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let n_u32 = u32::try_from(n).unwrap_or(u32::MAX);
    let base = total / n_u32;
    let extra = (total % n_u32) as usize;
    (0..n).map(|i| base + u32::from(i < extra)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::FixtureStorage;

    #[test]
    fn set_rejects_out_of_range_and_overflow() {
        let mut storage = SlotStorage::new(2, 10);
        assert_eq!(
            storage.set(5, None),
            Err(HostError::SlotOutOfRange { slot: 5, len: 2 })
        );
        assert!(matches!(
            storage.set(0, Some(ItemStack::new(ItemKind::Wood, 11))),
            Err(HostError::StackOverflow { .. })
        ));
    }

    #[test]
    fn insert_tops_up_before_using_empty_slots() {
        let mut storage = SlotStorage::new(3, 10);
        storage.set(0, None).unwrap();
        storage
            .set(2, Some(ItemStack::new(ItemKind::Sulfur, 7)))
            .unwrap();

        let inserted = insert_into(&mut storage, 0..3, ItemKind::Sulfur, 5).unwrap();

        assert_eq!(inserted, 5);
        assert_eq!(storage.get(2), Some(ItemStack::new(ItemKind::Sulfur, 10)));
        assert_eq!(storage.get(0), Some(ItemStack::new(ItemKind::Sulfur, 2)));
        assert_eq!(storage.get(1), None);
    }

    #[test]
    fn insert_stops_when_full() {
        let mut storage = SlotStorage::new(2, 10);
        storage.set(1, Some(ItemStack::new(ItemKind::Wood, 4))).unwrap();
        let inserted = insert_into(&mut storage, 0..2, ItemKind::Sulfur, 50).unwrap();
        assert_eq!(inserted, 10);
        assert_eq!(room_for(&storage, 0..2, ItemKind::Sulfur), 0);
    }

    #[test]
    fn remove_clears_emptied_slots() {
        let mut storage = SlotStorage::new(2, 10);
        storage.set(0, Some(ItemStack::new(ItemKind::Wood, 3))).unwrap();
        storage.set(1, Some(ItemStack::new(ItemKind::Wood, 5))).unwrap();

        let removed = remove_from(&mut storage, 0..2, ItemKind::Wood, 4).unwrap();

        assert_eq!(removed, 4);
        assert_eq!(storage.get(0), None);
        assert_eq!(count_in(&storage, 0..2, ItemKind::Wood), 4);
    }

    #[test]
    fn failed_insert_leaves_storage_untouched() {
        let mut storage = FixtureStorage::new(3);
        storage.set(0, Some(ItemStack::new(ItemKind::Sulfur, 995))).unwrap();
        storage.locked = 2..3;

        let err = insert_into(&mut storage, 0..3, ItemKind::Sulfur, 1500).unwrap_err();

        assert_eq!(err, HostError::SlotLocked { slot: 2 });
        assert_eq!(storage.get(0), Some(ItemStack::new(ItemKind::Sulfur, 995)));
        assert_eq!(storage.get(1), None);
    }

    #[test]
    fn failed_remove_leaves_storage_untouched() {
        let mut storage = FixtureStorage::new(2);
        storage.set(0, Some(ItemStack::new(ItemKind::Wood, 3))).unwrap();
        storage.set(1, Some(ItemStack::new(ItemKind::Wood, 5))).unwrap();
        storage.locked = 1..2;

        assert!(remove_from(&mut storage, 0..2, ItemKind::Wood, 6).is_err());
        assert_eq!(count_in(&storage, 0..2, ItemKind::Wood), 8);
    }

    #[test]
    fn even_split_gives_remainder_to_earliest() {
        assert_eq!(even_split(100, 3), vec![34, 33, 33]);
        assert_eq!(even_split(5, 2), vec![3, 2]);
        assert!(even_split(5, 0).is_empty());
    }
}
