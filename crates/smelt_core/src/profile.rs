//! Preset tuning table and the cached resolver in front of it.

use serde::Serialize;

use crate::{Preset, BASELINE_FUEL_PER_UNIT};

/// Per-cycle pacing for one preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PresetTuning {
    pub preset: Preset,
    pub cycle_seconds: f64,
    pub max_total_consumed_per_cycle: u32,
    pub max_consumed_per_stack_per_cycle: u32,
    /// Fuel burned per second by a station running at full budget.
    pub baseline_fuel_per_second: f64,
    /// Nominal speed-up over native processing.
    pub multiplier: u32,
}

impl PresetTuning {
    /// Fuel a full-budget cycle would burn. Used for idle burn.
    pub fn full_cycle_fuel(&self) -> f64 {
        self.baseline_fuel_per_second * self.cycle_seconds
    }
}

/// Pure preset → tuning mapping.
pub fn tuning_for(preset: Preset) -> PresetTuning {
    let (multiplier, cycle_seconds, total, per_stack) = match preset {
        Preset::Relaxed => (2, 1.0, 10, 4),
        Preset::Standard => (5, 1.0, 25, 10),
        Preset::Fast => (10, 0.5, 25, 10),
        Preset::Turbo => (20, 0.5, 100, 40),
        Preset::Instant => (50, 0.25, 250, 100),
    };
    PresetTuning {
        preset,
        cycle_seconds,
        max_total_consumed_per_cycle: total,
        max_consumed_per_stack_per_cycle: per_stack,
        baseline_fuel_per_second: f64::from(total) / cycle_seconds * BASELINE_FUEL_PER_UNIT,
        multiplier,
    }
}

/// Caches the tuning of the configured preset; re-resolves only when the
/// preset string changes.
#[derive(Debug)]
pub struct TuningProfileResolver {
    key: String,
    tuning: PresetTuning,
}

impl Default for TuningProfileResolver {
    fn default() -> Self {
        Self {
            key: Preset::Standard.as_str().to_string(),
            tuning: tuning_for(Preset::Standard),
        }
    }
}

impl TuningProfileResolver {
    pub fn resolve(&mut self, preset_name: &str) -> PresetTuning {
        if self.key != preset_name {
            self.tuning = tuning_for(Preset::normalize(preset_name));
            preset_name.clone_into(&mut self.key);
        }
        self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turbo_idle_cycle_burns_about_166_fuel() {
        let tuning = tuning_for(Preset::Turbo);
        assert!((tuning.cycle_seconds - 0.5).abs() < 1e-9);
        assert_eq!(tuning.max_total_consumed_per_cycle, 100);
        assert!((tuning.full_cycle_fuel() - 166.666_666).abs() < 1e-3);
    }

    #[test]
    fn faster_presets_move_more_per_second() {
        let per_second: Vec<f64> = Preset::ALL
            .iter()
            .map(|p| {
                let t = tuning_for(*p);
                f64::from(t.max_total_consumed_per_cycle) / t.cycle_seconds
            })
            .collect();
        assert!(per_second.windows(2).all(|w| w[0] < w[1]), "{per_second:?}");
    }

    #[test]
    fn resolver_caches_until_name_changes() {
        let mut resolver = TuningProfileResolver::default();
        assert_eq!(resolver.resolve("standard").preset, Preset::Standard);
        assert_eq!(resolver.resolve("fast").preset, Preset::Fast);
        assert_eq!(resolver.resolve("fast").preset, Preset::Fast);
        assert_eq!(resolver.resolve("bogus").preset, Preset::Standard);
    }
}
