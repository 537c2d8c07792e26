//! Budgeted multi-stack conversion for one station cycle.
//!
//! Order of operations:
//! 1. Snapshot convertible input stacks into the tracker's buffer.
//! 2. Skip the cycle if byproduct backpressure (`Pause`) has no room.
//! 3. Up to three passes: one unit per stack for fairness, then the rest of
//!    the budget proportionally to each stack's remaining capacity, then
//!    execute. Stop early when a pass makes no progress.
//! 4. Debit fuel for what was converted, or idle burn if nothing was.

use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use crate::host::{count_in, insert_into, remove_from, room_for, HostError, Station};
use crate::ledger::{ByproductRule, Settlement};
use crate::tracking::{InputStack, Tracker};
use crate::{
    ByproductConfig, ItemStack, OverflowPolicy, PresetTuning, Species, BYPRODUCT_ITEM, FUEL_ITEM,
};

pub const MAX_PASSES: usize = 3;

type Amounts = SmallVec<[u32; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `Pause` policy and no room for byproduct.
    ByproductFull,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub converted: SmallVec<[(Species, u32); 4]>,
    pub idle_burn: bool,
    pub settlement: Settlement,
    pub skipped: Option<SkipReason>,
}

impl CycleOutcome {
    pub fn total_converted(&self) -> u32 {
        self.converted.iter().map(|(_, n)| n).sum()
    }

    fn record(&mut self, species: Species, amount: u32) {
        if let Some(entry) = self.converted.iter_mut().find(|(s, _)| *s == species) {
            entry.1 += amount;
        } else {
            self.converted.push((species, amount));
        }
    }
}

/// Settings one cycle runs under.
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub tuning: &'a PresetTuning,
    pub byproduct: &'a ByproductConfig,
}

/// How many units of `species` the given fuel can still convert.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // floor of a clamped non-negative value
pub fn fuel_limited_max(species: Species, fuel: f64) -> u32 {
    if fuel.is_infinite() {
        return u32::MAX;
    }
    // Tolerance keeps 5.0 / (5/3) from flooring to 2.
    (fuel.max(0.0) / species.fuel_per_unit() + 1e-9)
        .floor()
        .min(f64::from(u32::MAX)) as u32
}

/// Split `budget` across stacks in proportion to their capacity.
///
/// Each allocation stays within its capacity and the allocations sum to
/// exactly `min(budget, Σ capacity)`. Rounding leftovers go one unit at a
/// time, in stack order, to stacks still under capacity.
#[allow(clippy::cast_possible_truncation)] // each share is <= its u32 capacity
pub fn proportional_allocate(capacities: &[u32], budget: u32) -> Amounts {
    let total_capacity: u64 = capacities.iter().map(|&c| u64::from(c)).sum();
    if total_capacity <= u64::from(budget) {
        return capacities.iter().copied().collect();
    }

    let mut allocation: Amounts = capacities
        .iter()
        .map(|&c| (u64::from(c) * u64::from(budget) / total_capacity) as u32)
        .collect();
    let allocated: u32 = allocation.iter().sum();
    let mut leftover = budget - allocated;

    while leftover > 0 {
        let mut progressed = false;
        for (slot, &capacity) in allocation.iter_mut().zip(capacities) {
            if leftover == 0 {
                break;
            }
            if *slot < capacity {
                *slot += 1;
                leftover -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    allocation
}

fn snapshot_inputs(tracker: &mut Tracker, station: &dyn Station) {
    tracker.inputs.clear();
    let storage = station.storage();
    let range = station.input_slots();
    let end = range.end.min(storage.slot_count());
    for slot in range.start..end {
        let Some(stack) = storage.get(slot) else {
            continue;
        };
        let Some(species) = stack.kind.species() else {
            continue;
        };
        if stack.amount > 0 && tracker.kind.accepts(species) {
            tracker.inputs.push(InputStack {
                slot,
                species,
                amount: stack.amount,
            });
        }
    }
}

fn byproduct_rule(station: &dyn Station, config: &ByproductConfig) -> Option<ByproductRule> {
    if !config.enabled {
        return None;
    }
    Some(ByproductRule {
        ratio: config.ratio,
        policy: config.overflow_policy,
        capacity: room_for(station.storage(), station.output_slots(), BYPRODUCT_ITEM),
    })
}

/// Remaining per-stack capacity for this pass. `fuel` must already exclude
/// whatever earlier grants in the pass reserved.
fn stack_capacity(
    input: &InputStack,
    already: u32,
    consumed: u32,
    per_stack_cap: u32,
    fuel: f64,
) -> u32 {
    let left_in_stack = input.amount.saturating_sub(already);
    let left_under_cap = per_stack_cap.saturating_sub(consumed + already);
    left_in_stack
        .min(left_under_cap)
        .min(fuel_limited_max(input.species, fuel))
}

/// Convert `amount` units of the stack at `input.slot`, clipped to what is
/// really there and to output room. Returns units converted.
fn convert_stack(
    station: &mut dyn Station,
    input: &InputStack,
    amount: u32,
) -> Result<u32, HostError> {
    let out_range = station.output_slots();
    let storage = station.storage_mut();
    let present = match storage.get(input.slot) {
        Some(stack) if stack.kind == input.species.input() => stack.amount,
        _ => 0,
    };
    let per_unit = input.species.output_per_unit();
    let fits = room_for(storage, out_range.clone(), input.species.output()) / per_unit;
    let units = amount.min(present).min(fits);
    if units == 0 {
        return Ok(0);
    }

    // Output first; the input is only taken once the output has landed.
    let produced = insert_into(
        storage,
        out_range.clone(),
        input.species.output(),
        units * per_unit,
    )?;
    let left = present - units;
    if let Err(err) = storage.set(
        input.slot,
        (left > 0).then(|| ItemStack::new(input.species.input(), left)),
    ) {
        remove_from(storage, out_range, input.species.output(), produced)?;
        return Err(err);
    }
    Ok(units)
}

/// Run one conversion cycle for `station`.
pub fn run_cycle(
    tracker: &mut Tracker,
    station: &mut dyn Station,
    ctx: &CycleContext<'_>,
) -> Result<CycleOutcome, HostError> {
    let mut outcome = CycleOutcome::default();
    snapshot_inputs(tracker, station);

    let gated = tracker.fuel_gated;
    let rule = if gated {
        byproduct_rule(station, ctx.byproduct)
    } else {
        None
    };
    if let Some(rule) = rule {
        if rule.policy == OverflowPolicy::Pause && rule.capacity == 0 {
            outcome.skipped = Some(SkipReason::ByproductFull);
            return Ok(outcome);
        }
    }

    let fuel_on_hand = if gated {
        count_in(station.storage(), station.fuel_slots(), FUEL_ITEM)
    } else {
        0
    };
    let mut simulated_fuel = if gated {
        (f64::from(fuel_on_hand) - tracker.ledger.fuel_debt()).max(0.0)
    } else {
        f64::INFINITY
    };

    let per_stack_cap = ctx.tuning.max_consumed_per_stack_per_cycle;
    let mut budget = ctx.tuning.max_total_consumed_per_cycle;
    let stack_count = tracker.inputs.len();
    let mut consumed: Amounts = smallvec![0; stack_count];

    for _ in 0..MAX_PASSES {
        if budget == 0 || !tracker.inputs.iter().any(|s| s.amount > 0) {
            break;
        }

        // Fairness: at most one unit per active stack.
        let mut allocation: Amounts = smallvec![0; stack_count];
        let mut pass_budget = budget;
        let mut pass_fuel = simulated_fuel;
        for (i, input) in tracker.inputs.iter().enumerate() {
            if pass_budget == 0 {
                break;
            }
            let capacity = stack_capacity(input, 0, consumed[i], per_stack_cap, pass_fuel);
            let grant = capacity.min(1);
            allocation[i] = grant;
            pass_budget -= grant;
            pass_fuel -= f64::from(grant) * input.species.fuel_per_unit();
        }

        // Proportional share of whatever budget is left.
        let capacities: Amounts = tracker
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                stack_capacity(input, allocation[i], consumed[i], per_stack_cap, pass_fuel)
            })
            .collect();
        let shares = proportional_allocate(&capacities, pass_budget);
        for (slot, share) in allocation.iter_mut().zip(shares) {
            *slot += share;
        }

        // Execute, re-checking fuel as it drains.
        let mut progress = 0_u32;
        for (i, want) in allocation.iter().copied().enumerate() {
            if want == 0 || budget == 0 {
                continue;
            }
            let input = tracker.inputs[i];
            let want = want
                .min(budget)
                .min(fuel_limited_max(input.species, simulated_fuel));
            let done = convert_stack(station, &input, want)?;
            if done == 0 {
                continue;
            }
            tracker.inputs[i].amount -= done;
            consumed[i] += done;
            budget -= done;
            progress += done;
            if gated {
                simulated_fuel -= f64::from(done) * input.species.fuel_per_unit();
            }
            outcome.record(input.species, done);
        }

        if progress == 0 {
            break;
        }
    }

    if !gated {
        return Ok(outcome);
    }

    if outcome.total_converted() > 0 {
        let burned: f64 = outcome
            .converted
            .iter()
            .map(|(species, n)| f64::from(*n) * species.fuel_per_unit())
            .sum();
        tracker.ledger.debit(burned);
    } else if !ctx.tuning.preset.is_fastest() {
        tracker.ledger.debit(ctx.tuning.full_cycle_fuel());
        outcome.idle_burn = true;
    }

    // Primary output may have used byproduct room; measure again.
    let rule = byproduct_rule(station, ctx.byproduct);
    outcome.settlement = tracker.ledger.settle(fuel_on_hand, rule);
    apply_settlement(station, &outcome.settlement)?;
    Ok(outcome)
}

fn apply_settlement(station: &mut dyn Station, settlement: &Settlement) -> Result<(), HostError> {
    let fuel_range = station.fuel_slots();
    let out_range = station.output_slots();
    let storage = station.storage_mut();
    if settlement.fuel_removed > 0 {
        remove_from(storage, fuel_range, FUEL_ITEM, settlement.fuel_removed)?;
    }
    if settlement.byproduct_minted > 0 {
        insert_into(storage, out_range, BYPRODUCT_ITEM, settlement.byproduct_minted)?;
    }
    Ok(())
}
