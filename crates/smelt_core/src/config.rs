//! Configuration model.
//!
//! `SmeltConfig` mirrors the configuration file. Free-form strings (preset,
//! bias) are parsed into enums here, once, so that the scheduler only ever
//! sees typed values.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Relaxed,
    Standard,
    Fast,
    Turbo,
    Instant,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Relaxed,
        Preset::Standard,
        Preset::Fast,
        Preset::Turbo,
        Preset::Instant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relaxed => "relaxed",
            Self::Standard => "standard",
            Self::Fast => "fast",
            Self::Turbo => "turbo",
            Self::Instant => "instant",
        }
    }

    /// Parse a preset name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }

    /// Parse a preset name, falling back to `Standard` with a warning.
    pub fn normalize(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(preset = name, "unknown preset, using 'standard'");
            Self::Standard
        })
    }

    pub fn is_fastest(self) -> bool {
        self == Self::Instant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Balanced,
    Performance,
    Responsiveness,
}

impl Bias {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::Responsiveness => "responsiveness",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        [Self::Balanced, Self::Performance, Self::Responsiveness]
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(name))
    }

    pub fn normalize(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(bias = name, "unknown auto-tune bias, using 'balanced'");
            Self::Balanced
        })
    }
}

/// What to do when byproduct storage is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep burning fuel; drop byproduct that does not fit.
    #[default]
    Skip,
    /// Hold back fuel consumption until byproduct has room.
    Pause,
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTuneConfig {
    pub enabled: bool,
    /// Expected station population. 0 means "use the tracked count".
    pub population: u32,
    pub bias: String,
    pub write_back: bool,
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            population: 0,
            bias: Bias::Balanced.as_str().to_string(),
            write_back: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OreSplittingConfig {
    pub enabled: bool,
}

impl Default for OreSplittingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByproductConfig {
    pub enabled: bool,
    /// Byproduct minted per unit of fuel burned.
    pub ratio: f64,
    pub overflow_policy: OverflowPolicy,
}

impl Default for ByproductConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: 0.75,
            overflow_policy: OverflowPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPullConfig {
    pub enabled: bool,
    /// Extra fuel pulled on top of the computed need, 0–10 %.
    pub buffer_percent: f64,
}

impl Default for AutoPullConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_percent: 5.0,
        }
    }
}

impl AutoPullConfig {
    pub fn clamped_buffer_percent(&self) -> f64 {
        if self.buffer_percent.is_finite() {
            self.buffer_percent.clamp(0.0, 10.0)
        } else {
            0.0
        }
    }
}

/// Raw (manual) scheduling parameters. With AutoTune enabled these are only
/// the fallback and, with write-back, the place computed values land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub adaptive_enabled: bool,
    pub min_per_tick: u32,
    pub max_per_tick: u32,
    pub dynamic_interval_enabled: bool,
    /// Seconds.
    pub min_interval: f64,
    /// Seconds.
    pub max_interval: f64,
    pub low_count_threshold: u32,
    pub high_count_threshold: u32,
    /// Seconds; used when the dynamic interval is disabled.
    pub fixed_interval: f64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            adaptive_enabled: true,
            min_per_tick: 25,
            max_per_tick: 150,
            dynamic_interval_enabled: true,
            min_interval: 0.05,
            max_interval: 0.2,
            low_count_threshold: 50,
            high_count_threshold: 300,
            fixed_interval: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmeltConfig {
    pub enabled: bool,
    pub preset: String,
    pub auto_tune: AutoTuneConfig,
    pub ore_splitting: OreSplittingConfig,
    pub byproduct: ByproductConfig,
    pub auto_pull_fuel: AutoPullConfig,
    pub scheduling: SchedulingConfig,
    /// Name fragments of stations the scheduler may take over.
    pub station_whitelist: Vec<String>,
}

impl Default for SmeltConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: Preset::Standard.as_str().to_string(),
            auto_tune: AutoTuneConfig::default(),
            ore_splitting: OreSplittingConfig::default(),
            byproduct: ByproductConfig::default(),
            auto_pull_fuel: AutoPullConfig::default(),
            scheduling: SchedulingConfig::default(),
            station_whitelist: vec![
                "furnace".to_string(),
                "refinery".to_string(),
            ],
        }
    }
}

impl SmeltConfig {
    /// Rewrite free-form fields into their canonical spelling, warning about
    /// anything that had to be replaced. Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let preset = Preset::normalize(&self.preset).as_str();
        let bias = Bias::normalize(&self.auto_tune.bias).as_str();
        let mut changed = false;
        if self.preset != preset {
            self.preset = preset.to_string();
            changed = true;
        }
        if self.auto_tune.bias != bias {
            self.auto_tune.bias = bias.to_string();
            changed = true;
        }
        if !self.byproduct.ratio.is_finite() || self.byproduct.ratio < 0.0 {
            tracing::warn!(ratio = self.byproduct.ratio, "invalid byproduct ratio, using 0");
            self.byproduct.ratio = 0.0;
            changed = true;
        }
        let buffer = self.auto_pull_fuel.clamped_buffer_percent();
        if (buffer - self.auto_pull_fuel.buffer_percent).abs() > f64::EPSILON
            || !self.auto_pull_fuel.buffer_percent.is_finite()
        {
            self.auto_pull_fuel.buffer_percent = buffer;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_parse_is_case_insensitive() {
        assert_eq!(Preset::parse("Turbo"), Some(Preset::Turbo));
        assert_eq!(Preset::parse(" instant "), Some(Preset::Instant));
        assert_eq!(Preset::parse("ludicrous"), None);
    }

    #[test]
    fn normalize_replaces_unknown_strings() {
        let mut config = SmeltConfig {
            preset: "ludicrous".to_string(),
            ..SmeltConfig::default()
        };
        config.auto_tune.bias = "chaos".to_string();

        assert!(config.normalize());
        assert_eq!(config.preset, "standard");
        assert_eq!(config.auto_tune.bias, "balanced");
        assert!(!config.normalize(), "second pass is a no-op");
    }

    #[test]
    fn normalize_clamps_buffer_percent() {
        let mut config = SmeltConfig::default();
        config.auto_pull_fuel.buffer_percent = 40.0;
        config.normalize();
        assert!((config.auto_pull_fuel.buffer_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: SmeltConfig =
            serde_json::from_str(r#"{"preset": "fast", "byproduct": {"overflow_policy": "pause"}}"#)
                .unwrap();
        assert_eq!(config.preset, "fast");
        assert_eq!(config.byproduct.overflow_policy, OverflowPolicy::Pause);
        assert!((config.byproduct.ratio - 0.75).abs() < 1e-9);
        assert!(config.auto_tune.enabled);
    }
}
