//! Fractional fuel-debt and byproduct bookkeeping.
//!
//! Conversion burns fractional amounts of fuel; storage only holds whole
//! units. Debits accumulate here and only the integer part is removed,
//! the fraction carries into the next cycle. Byproduct minting keeps its own
//! fractional remainder the same way.

use serde::Serialize;

use crate::OverflowPolicy;

/// Byproduct minting parameters for one settlement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByproductRule {
    pub ratio: f64,
    pub policy: OverflowPolicy,
    /// Units of byproduct the station can currently accept.
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub fuel_removed: u32,
    pub byproduct_minted: u32,
    /// Minted under `Skip` but discarded for lack of room.
    pub byproduct_dropped: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FuelLedger {
    fuel_debt: f64,
    byproduct_remainder: f64,
}

impl FuelLedger {
    pub fn fuel_debt(&self) -> f64 {
        self.fuel_debt
    }

    pub fn byproduct_remainder(&self) -> f64 {
        self.byproduct_remainder
    }

    /// Record `fuel` units of burn.
    pub fn debit(&mut self, fuel: f64) {
        if fuel.is_finite() && fuel > 0.0 {
            self.fuel_debt += fuel;
        }
    }

    /// Turn accumulated debt into whole units of fuel to remove and
    /// byproduct to mint, given `available_fuel` on hand.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // floor of a non-negative, clamped value
    pub fn settle(&mut self, available_fuel: u32, byproduct: Option<ByproductRule>) -> Settlement {
        let whole_debt = self.fuel_debt.floor().clamp(0.0, f64::from(u32::MAX)) as u32;
        let mut fuel_removed = whole_debt.min(available_fuel);

        if let Some(rule) = byproduct {
            if rule.policy == OverflowPolicy::Pause {
                fuel_removed = fuel_removed.min(max_fuel_for_capacity(
                    rule.capacity,
                    rule.ratio,
                    self.byproduct_remainder,
                ));
            }
        }

        let mut settlement = Settlement {
            fuel_removed,
            ..Settlement::default()
        };

        if let Some(rule) = byproduct {
            if rule.ratio > 0.0 {
                let raw = f64::from(fuel_removed) * rule.ratio + self.byproduct_remainder;
                let minted = raw.floor().clamp(0.0, f64::from(u32::MAX)) as u32;
                self.byproduct_remainder = raw - f64::from(minted);
                settlement.byproduct_minted = minted.min(rule.capacity);
                settlement.byproduct_dropped = minted - settlement.byproduct_minted;
            }
        }

        self.fuel_debt -= f64::from(fuel_removed);
        // Debt the station can never pay is forgiven down to its fraction.
        let payable = f64::from(available_fuel - fuel_removed) + self.fuel_debt.fract();
        if self.fuel_debt > payable {
            self.fuel_debt = payable;
        }
        settlement
    }
}

/// Largest fuel amount whose byproduct (plus `remainder`) fits `capacity`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn max_fuel_for_capacity(capacity: u32, ratio: f64, remainder: f64) -> u32 {
    if ratio <= 0.0 || !ratio.is_finite() {
        return u32::MAX;
    }
    let mints = |fuel: u32| (f64::from(fuel) * ratio + remainder).floor();
    let limit = f64::from(capacity);
    let estimate = ((limit + 1.0 - remainder) / ratio).ceil() - 1.0;
    let mut fuel = estimate.clamp(0.0, f64::from(u32::MAX)) as u32;
    while fuel > 0 && mints(fuel) > limit {
        fuel -= 1;
    }
    fuel
}
