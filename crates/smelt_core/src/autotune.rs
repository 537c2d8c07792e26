//! AutoTune: derive scheduling parameters from an expected population, the
//! active preset and a bias, instead of hand-tuned configuration.

use serde::Serialize;

use crate::{Bias, Preset, SchedulingConfig};

pub const MAX_POPULATION: u32 = 5000;

const CAP_FLOOR: u32 = 25;
const CAP_CEIL: u32 = 10_000;
const INTERVAL_FLOOR: f64 = 0.03;
const INTERVAL_CEIL: f64 = 2.0;

/// Float fields are only written back when they moved by more than this.
const WRITE_BACK_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectiveSchedulingParams {
    pub adaptive_enabled: bool,
    pub min_per_tick: u32,
    pub max_per_tick: u32,
    pub dynamic_interval_enabled: bool,
    pub min_interval: f64,
    pub max_interval: f64,
    pub low_count_threshold: u32,
    pub high_count_threshold: u32,
    pub fixed_interval: f64,
}

impl EffectiveSchedulingParams {
    /// Mirror the raw configuration verbatim.
    pub fn from_raw(raw: &SchedulingConfig) -> Self {
        Self {
            adaptive_enabled: raw.adaptive_enabled,
            min_per_tick: raw.min_per_tick,
            max_per_tick: raw.max_per_tick,
            dynamic_interval_enabled: raw.dynamic_interval_enabled,
            min_interval: raw.min_interval,
            max_interval: raw.max_interval,
            low_count_threshold: raw.low_count_threshold,
            high_count_threshold: raw.high_count_threshold,
            fixed_interval: raw.fixed_interval,
        }
    }
}

/// Baseline scheduling profile for one population anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorProfile {
    pub population: u32,
    pub min_per_tick: u32,
    pub max_per_tick: u32,
    pub min_interval: f64,
    pub max_interval: f64,
    pub low_count_threshold: u32,
    pub high_count_threshold: u32,
}

const fn anchor(
    population: u32,
    per_tick: (u32, u32),
    interval: (f64, f64),
    thresholds: (u32, u32),
) -> AnchorProfile {
    AnchorProfile {
        population,
        min_per_tick: per_tick.0,
        max_per_tick: per_tick.1,
        min_interval: interval.0,
        max_interval: interval.1,
        low_count_threshold: thresholds.0,
        high_count_threshold: thresholds.1,
    }
}

/// Ascending by population.
pub const ANCHORS: [AnchorProfile; 8] = [
    anchor(10, (25, 50), (0.05, 0.10), (5, 20)),
    anchor(25, (25, 75), (0.05, 0.12), (10, 40)),
    anchor(50, (40, 100), (0.06, 0.15), (20, 80)),
    anchor(100, (60, 150), (0.08, 0.20), (50, 150)),
    anchor(200, (80, 200), (0.10, 0.25), (100, 300)),
    anchor(300, (100, 250), (0.10, 0.30), (150, 450)),
    anchor(400, (120, 300), (0.12, 0.35), (200, 600)),
    anchor(500, (150, 400), (0.15, 0.40), (250, 800)),
];

/// Nearest anchor by absolute distance; on a tie the first (smaller) one wins.
pub fn nearest_anchor(population: u32) -> &'static AnchorProfile {
    let population = population.min(MAX_POPULATION);
    let mut best = &ANCHORS[0];
    for candidate in &ANCHORS[1..] {
        if candidate.population.abs_diff(population) < best.population.abs_diff(population) {
            best = candidate;
        }
    }
    best
}

/// `(ovens_factor, interval_factor)`: faster presets run fewer stations per
/// tick at a longer interval, slower presets the reverse.
pub fn preset_factors(preset: Preset) -> (f64, f64) {
    match preset {
        Preset::Relaxed => (1.25, 0.85),
        Preset::Standard => (1.0, 1.0),
        Preset::Fast => (0.9, 1.1),
        Preset::Turbo => (0.8, 1.2),
        Preset::Instant => (0.7, 1.35),
    }
}

pub fn bias_factors(bias: Bias) -> (f64, f64) {
    match bias {
        Bias::Balanced => (1.0, 1.0),
        Bias::Performance => (0.9, 1.1),
        Bias::Responsiveness => (1.1, 0.9),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to CAP range first
fn scale_cap(base: u32, factor: f64) -> u32 {
    (f64::from(base) * factor)
        .round()
        .clamp(f64::from(CAP_FLOOR), f64::from(CAP_CEIL)) as u32
}

fn scale_interval(base: f64, factor: f64) -> f64 {
    (base * factor).clamp(INTERVAL_FLOOR, INTERVAL_CEIL)
}

/// Pure derivation. Identical inputs always give identical output.
pub fn derive(
    population: u32,
    preset: Preset,
    bias: Bias,
    raw: &SchedulingConfig,
) -> EffectiveSchedulingParams {
    let base = nearest_anchor(population);
    let (preset_cap, preset_interval) = preset_factors(preset);
    let (bias_cap, bias_interval) = bias_factors(bias);
    let cap_factor = preset_cap * bias_cap;
    let interval_factor = preset_interval * bias_interval;

    let min_per_tick = scale_cap(base.min_per_tick, cap_factor);
    let max_per_tick = scale_cap(base.max_per_tick, cap_factor).max(min_per_tick);
    let min_interval = scale_interval(base.min_interval, interval_factor);
    let max_interval = scale_interval(base.max_interval, interval_factor).max(min_interval);

    EffectiveSchedulingParams {
        adaptive_enabled: true,
        min_per_tick,
        max_per_tick,
        dynamic_interval_enabled: true,
        min_interval,
        max_interval,
        low_count_threshold: base.low_count_threshold,
        high_count_threshold: base.high_count_threshold,
        fixed_interval: raw.fixed_interval,
    }
}

/// Copy derived values into the raw configuration, touching only fields that
/// actually differ. Returns whether anything was written.
pub fn write_back(params: &EffectiveSchedulingParams, raw: &mut SchedulingConfig) -> bool {
    fn set_u32(slot: &mut u32, value: u32, changed: &mut bool) {
        if *slot != value {
            *slot = value;
            *changed = true;
        }
    }
    fn set_f64(slot: &mut f64, value: f64, changed: &mut bool) {
        if (*slot - value).abs() > WRITE_BACK_EPSILON {
            *slot = value;
            *changed = true;
        }
    }
    fn set_bool(slot: &mut bool, value: bool, changed: &mut bool) {
        if *slot != value {
            *slot = value;
            *changed = true;
        }
    }

    let mut changed = false;
    set_bool(&mut raw.adaptive_enabled, params.adaptive_enabled, &mut changed);
    set_u32(&mut raw.min_per_tick, params.min_per_tick, &mut changed);
    set_u32(&mut raw.max_per_tick, params.max_per_tick, &mut changed);
    set_bool(
        &mut raw.dynamic_interval_enabled,
        params.dynamic_interval_enabled,
        &mut changed,
    );
    set_f64(&mut raw.min_interval, params.min_interval, &mut changed);
    set_f64(&mut raw.max_interval, params.max_interval, &mut changed);
    set_u32(&mut raw.low_count_threshold, params.low_count_threshold, &mut changed);
    set_u32(&mut raw.high_count_threshold, params.high_count_threshold, &mut changed);
    changed
}

/// How the effective parameters were obtained, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TuningMode {
    Manual,
    AutoTune {
        anchor: u32,
        preset: Preset,
        bias: Bias,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    enabled: bool,
    population: u32,
    preset: Preset,
    bias: Bias,
    raw: SchedulingConfig,
}

/// Caches the effective parameters until one of their inputs changes.
#[derive(Debug, Default)]
pub struct AutoTuneEngine {
    cache: Option<(CacheKey, EffectiveSchedulingParams)>,
}

impl AutoTuneEngine {
    /// `population` is the configured estimate; 0 falls back to
    /// `tracked_count`.
    pub fn effective(
        &mut self,
        enabled: bool,
        population: u32,
        tracked_count: usize,
        preset: Preset,
        bias: Bias,
        raw: &SchedulingConfig,
    ) -> EffectiveSchedulingParams {
        let population = if population == 0 {
            u32::try_from(tracked_count).unwrap_or(MAX_POPULATION)
        } else {
            population
        }
        .min(MAX_POPULATION);

        let key = CacheKey {
            enabled,
            population: if enabled { population } else { 0 },
            preset,
            bias,
            raw: raw.clone(),
        };
        if let Some((cached_key, params)) = &self.cache {
            if *cached_key == key {
                return *params;
            }
        }

        let params = if enabled {
            let params = derive(population, preset, bias, raw);
            tracing::debug!(
                population,
                anchor = nearest_anchor(population).population,
                min_per_tick = params.min_per_tick,
                max_per_tick = params.max_per_tick,
                "auto-tune recomputed"
            );
            params
        } else {
            EffectiveSchedulingParams::from_raw(raw)
        };
        self.cache = Some((key, params));
        params
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}
