//! Config loading and the in-memory demo world shared between smelt_cli and
//! smelt_daemon.

mod world;

use std::path::Path;

use anyhow::{ensure, Context, Result};
use rand::Rng;
use rand::SeedableRng;
use smelt_core::{ItemKind, SmeltConfig, FUEL_ITEM};

pub use world::{
    prefab, Prefab, SimWorld, StationSummary, WorldActor, WorldEvent, WorldStation, ACTOR_SLOTS,
    PREFABS, WORLD_STACK_LIMIT,
};

pub const DEFAULT_CONFIG_PATH: &str = "content/smelt_config.json";

/// Read a config file. Missing sections fall back to defaults; unknown
/// preset or bias names are replaced with a warning.
pub fn load_config(path: &Path) -> Result<SmeltConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut config: SmeltConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if config.normalize() {
        tracing::warn!(path = %path.display(), "config normalized on load");
    }
    validate_config(&config)?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &SmeltConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("serializing config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, json + "\n").with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Load `path` if it exists, otherwise use defaults.
pub fn load_or_default(path: &Path) -> Result<SmeltConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        Ok(SmeltConfig::default())
    }
}

/// Reject values the scheduler cannot work with at all. Out-of-order
/// bounds are tolerated (the scheduler swaps them); these are not.
pub fn validate_config(config: &SmeltConfig) -> Result<()> {
    let sched = &config.scheduling;
    ensure!(
        !config.station_whitelist.iter().all(String::is_empty),
        "station_whitelist must name at least one station fragment"
    );
    ensure!(
        sched.min_per_tick > 0 || sched.max_per_tick > 0,
        "scheduling per-tick bounds are both zero"
    );
    for (name, value) in [
        ("min_interval", sched.min_interval),
        ("max_interval", sched.max_interval),
        ("fixed_interval", sched.fixed_interval),
    ] {
        ensure!(
            value.is_finite() && value > 0.0,
            "scheduling.{name} must be a positive number, got {value}"
        );
    }
    Ok(())
}

/// A deterministic world of `count` stations for demos and load tests.
///
/// Most stations are small furnaces; the mix also has large and electric
/// furnaces, refineries, and the odd campfire the whitelist ignores. Roughly
/// one in ten starts switched off.
pub fn build_demo_world(count: usize, seed: u64) -> Result<SimWorld> {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let mut world = SimWorld::default();

    for _ in 0..count {
        let roll: f64 = rng.gen();
        let name = match roll {
            r if r < 0.55 => "furnace",
            r if r < 0.75 => "furnace.large",
            r if r < 0.85 => "electric.furnace.deployed",
            r if r < 0.95 => "refinery_small_deployed",
            _ => "campfire",
        };
        let prefab = prefab(name).with_context(|| format!("unknown prefab {name}"))?;
        let (id, _) = world.spawn_station(prefab);

        let input = if name.contains("refinery") {
            ItemKind::CrudeOil
        } else {
            [ItemKind::MetalOre, ItemKind::SulfurOre, ItemKind::HighQualityOre]
                [rng.gen_range(0..3)]
        };
        world.stock(id, input, rng.gen_range(100..=3000), false)?;
        if prefab.fuel.1 > prefab.fuel.0 {
            world.stock(id, FUEL_ITEM, rng.gen_range(200..=2000), true)?;
        }
        if rng.gen_bool(0.9) {
            world.toggle(id, true);
        }
    }
    for _ in 0..count.div_ceil(20).max(1) {
        world.spawn_actor(&[])?;
    }
    tracing::debug!(stations = count, seed, "demo world built");
    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_world_is_deterministic() {
        let a = build_demo_world(50, 7).unwrap();
        let b = build_demo_world(50, 7).unwrap();
        let whitelist = SmeltConfig::default().station_whitelist;
        let a = serde_json::to_string(&a.summaries(&whitelist)).unwrap();
        let b = serde_json::to_string(&b.summaries(&whitelist)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = SmeltConfig::default();
        config.scheduling.min_interval = 0.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("min_interval"), "got: {err}");
    }

    #[test]
    fn validate_rejects_empty_whitelist() {
        let config = SmeltConfig {
            station_whitelist: vec![String::new()],
            ..SmeltConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
