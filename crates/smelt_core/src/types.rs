//! Type definitions for `smelt_core`.
//!
//! Item kinds, convertible species, station kinds and the ID newtypes shared
//! by the scheduler, the conversion engine and the host interfaces.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! net_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

net_id!(StationId);
net_id!(ActorId);

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    MetalOre,
    SulfurOre,
    HighQualityOre,
    CrudeOil,
    MetalFragments,
    Sulfur,
    HighQualityMetal,
    LowGradeFuel,
    Wood,
    Charcoal,
}

/// Fuel burned by fuel-gated stations.
pub const FUEL_ITEM: ItemKind = ItemKind::Wood;

/// Secondary output minted from burned fuel.
pub const BYPRODUCT_ITEM: ItemKind = ItemKind::Charcoal;

impl ItemKind {
    /// The species this item converts as, if it is convertible at all.
    pub fn species(self) -> Option<Species> {
        match self {
            Self::MetalOre => Some(Species::MetalOre),
            Self::SulfurOre => Some(Species::SulfurOre),
            Self::HighQualityOre => Some(Species::HighQualityOre),
            Self::CrudeOil => Some(Species::CrudeOil),
            Self::MetalFragments
            | Self::Sulfur
            | Self::HighQualityMetal
            | Self::LowGradeFuel
            | Self::Wood
            | Self::Charcoal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKind, amount: u32) -> Self {
        Self { kind, amount }
    }
}

// ---------------------------------------------------------------------------
// Convertible species
// ---------------------------------------------------------------------------

/// Fuel cost of one unit of metal ore; also the baseline used for idle burn.
pub const BASELINE_FUEL_PER_UNIT: f64 = 5.0 / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    MetalOre,
    SulfurOre,
    HighQualityOre,
    CrudeOil,
}

impl Species {
    pub fn input(self) -> ItemKind {
        match self {
            Self::MetalOre => ItemKind::MetalOre,
            Self::SulfurOre => ItemKind::SulfurOre,
            Self::HighQualityOre => ItemKind::HighQualityOre,
            Self::CrudeOil => ItemKind::CrudeOil,
        }
    }

    pub fn output(self) -> ItemKind {
        match self {
            Self::MetalOre => ItemKind::MetalFragments,
            Self::SulfurOre => ItemKind::Sulfur,
            Self::HighQualityOre => ItemKind::HighQualityMetal,
            Self::CrudeOil => ItemKind::LowGradeFuel,
        }
    }

    /// Output units produced per input unit.
    pub fn output_per_unit(self) -> u32 {
        match self {
            Self::CrudeOil => 3,
            Self::MetalOre | Self::SulfurOre | Self::HighQualityOre => 1,
        }
    }

    /// Fuel units burned per input unit converted.
    pub fn fuel_per_unit(self) -> f64 {
        match self {
            Self::MetalOre | Self::CrudeOil => BASELINE_FUEL_PER_UNIT,
            Self::SulfurOre => 5.0 / 6.0,
            Self::HighQualityOre => 10.0 / 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    SmallFurnace,
    LargeFurnace,
    ElectricFurnace,
    SmallRefinery,
    Unknown,
}

impl StationKind {
    /// Classify a station by its short name. The name must contain one of the
    /// whitelisted fragments; the kind is then decided by the most specific
    /// known fragment.
    pub fn classify(short_name: &str, whitelist: &[String]) -> Self {
        let name = short_name.to_ascii_lowercase();
        let whitelisted = whitelist
            .iter()
            .any(|fragment| !fragment.is_empty() && name.contains(&fragment.to_ascii_lowercase()));
        if !whitelisted {
            return Self::Unknown;
        }
        if name.contains("electric") {
            Self::ElectricFurnace
        } else if name.contains("refinery") {
            Self::SmallRefinery
        } else if name.contains("large") {
            Self::LargeFurnace
        } else if name.contains("furnace") {
            Self::SmallFurnace
        } else {
            Self::Unknown
        }
    }

    /// Whether conversion is limited by burnable fuel. Electric furnaces run
    /// on power and are never gated.
    pub fn is_fuel_gated(self) -> bool {
        matches!(
            self,
            Self::SmallFurnace | Self::LargeFurnace | Self::SmallRefinery
        )
    }

    pub fn accepts(self, species: Species) -> bool {
        match self {
            Self::SmallFurnace | Self::LargeFurnace | Self::ElectricFurnace => {
                species != Species::CrudeOil
            }
            Self::SmallRefinery => species == Species::CrudeOil,
            Self::Unknown => false,
        }
    }

    /// Number of fuel slots topped up by auto-pull.
    pub fn fuel_slot_count(self) -> usize {
        match self {
            Self::LargeFurnace => 2,
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Activity notifications
// ---------------------------------------------------------------------------

/// Host notification shapes that all mean "this station's activity may have
/// changed". They are folded into one [`ActivityEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Discovered,
    Toggled,
    FlagChanged,
    FirstProduction,
    Destroyed,
    Unloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub station: StationId,
    pub kind: ActivityKind,
}

/// A player-initiated move of a stack into a station slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    pub actor: ActorId,
    pub station: StationId,
    /// Slot in the actor's inventory the stack comes from.
    pub source_slot: usize,
    /// Slot in the station the player dropped the stack on.
    pub target_slot: usize,
    pub stack: ItemStack,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist() -> Vec<String> {
        vec!["furnace".to_string(), "refinery".to_string()]
    }

    #[test]
    fn classify_known_station_names() {
        let wl = whitelist();
        assert_eq!(StationKind::classify("furnace", &wl), StationKind::SmallFurnace);
        assert_eq!(
            StationKind::classify("furnace.large", &wl),
            StationKind::LargeFurnace
        );
        assert_eq!(
            StationKind::classify("electricfurnace.deployed", &wl),
            StationKind::ElectricFurnace
        );
        assert_eq!(
            StationKind::classify("refinery_small_deployed", &wl),
            StationKind::SmallRefinery
        );
    }

    #[test]
    fn classify_requires_whitelist_fragment() {
        let wl = vec!["refinery".to_string()];
        assert_eq!(StationKind::classify("furnace.large", &wl), StationKind::Unknown);
        assert_eq!(StationKind::classify("campfire", &whitelist()), StationKind::Unknown);
    }

    #[test]
    fn refinery_only_accepts_crude() {
        assert!(StationKind::SmallRefinery.accepts(Species::CrudeOil));
        assert!(!StationKind::SmallRefinery.accepts(Species::MetalOre));
        assert!(!StationKind::SmallFurnace.accepts(Species::CrudeOil));
        assert!(StationKind::ElectricFurnace.accepts(Species::SulfurOre));
    }

    #[test]
    fn electric_furnace_is_not_fuel_gated() {
        assert!(!StationKind::ElectricFurnace.is_fuel_gated());
        assert!(StationKind::LargeFurnace.is_fuel_gated());
        assert_eq!(StationKind::LargeFurnace.fuel_slot_count(), 2);
        assert_eq!(StationKind::SmallFurnace.fuel_slot_count(), 1);
    }
}
