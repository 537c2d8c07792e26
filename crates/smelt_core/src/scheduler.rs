//! One global scheduler for every tracked station.
//!
//! Each quantum applies the activity queued since the last one, then walks
//! the tracked ids from a persistent cursor and runs at most `cap` due
//! stations. The cursor moves one position per quantum regardless of how
//! many stations ran, so repeated short quanta still cover the whole set.
//!
//! The scheduler never owns a timer. The driver arms one at the interval
//! returned by [`Scheduler::start`] and, between quanta, asks
//! [`Scheduler::take_rearm`] whether it has to be recreated.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::autopull::pull_fuel;
use crate::autotune::{nearest_anchor, write_back, AutoTuneEngine, TuningMode, MAX_POPULATION};
use crate::conversion::{run_cycle, CycleContext};
use crate::host::{Station, StationHost};
use crate::profile::TuningProfileResolver;
use crate::splitter::{split_move, SplitOutcome};
use crate::tracking::{IdSnapshot, Tracker, TrackingSet, OFF_EVICTION_THRESHOLD};
use crate::{
    ActivityEvent, ActivityKind, ActorId, Bias, EffectiveSchedulingParams, HostError, PlayerMove,
    Preset, SmeltConfig, StationId, StationKind,
};

/// Per-quantum cap when adaptive scheduling is off.
pub const FIXED_PER_TICK_CAP: usize = 50;
/// Shortest spacing between two cycles of the same station, in seconds.
pub const MIN_CYCLE_SECONDS: f64 = 0.05;
/// Interval changes smaller than this do not re-arm the timer.
pub const RESCHEDULE_THRESHOLD: f64 = 0.005;

const FIXED_INTERVAL_BOUNDS: (f64, f64) = (0.05, 2.0);

// ---------------------------------------------------------------------------
// Pure pacing helpers
// ---------------------------------------------------------------------------

/// Stations processed per quantum for `tracked` stations.
pub fn per_tick_cap(params: &EffectiveSchedulingParams, tracked: usize) -> usize {
    if !params.adaptive_enabled {
        return FIXED_PER_TICK_CAP;
    }
    let (low, high) = ordered(params.min_per_tick, params.max_per_tick);
    let low = usize::try_from(low).unwrap_or(usize::MAX).max(1);
    let high = usize::try_from(high).unwrap_or(usize::MAX).max(low);
    tracked.clamp(low, high)
}

/// Timer interval (seconds) the scheduler wants for `tracked` stations.
pub fn desired_interval(params: &EffectiveSchedulingParams, tracked: usize) -> f64 {
    if !params.dynamic_interval_enabled {
        let (lo, hi) = FIXED_INTERVAL_BOUNDS;
        return if params.fixed_interval.is_finite() {
            params.fixed_interval.clamp(lo, hi)
        } else {
            lo
        };
    }
    let (fast, slow) = if params.min_interval <= params.max_interval {
        (params.min_interval, params.max_interval)
    } else {
        (params.max_interval, params.min_interval)
    };
    let low = f64::from(params.low_count_threshold);
    let high = f64::from(params.high_count_threshold).max(low + 1.0);
    let t = ((tracked as f64 - low) / (high - low)).clamp(0.0, 1.0);
    fast + (slow - fast) * t
}

fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running { interval: f64 },
    /// A new interval is waiting for the driver to re-arm the timer.
    RescheduleQueued { current: f64, pending: f64 },
}

impl SchedulerState {
    /// Interval the timer is currently armed at.
    pub fn current_interval(self) -> Option<f64> {
        match self {
            Self::Stopped => None,
            Self::Running { interval } => Some(interval),
            Self::RescheduleQueued { current, .. } => Some(current),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuantumReport {
    pub scanned: usize,
    pub processed: usize,
    pub pruned: usize,
    pub cap: usize,
    pub faults: usize,
    pub converted: u64,
    pub fuel_pulled: u64,
    /// AutoTune wrote new values into the scheduling config.
    pub config_written: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub enabled: bool,
    pub tracked: usize,
    pub per_tick_cap: usize,
    pub current_interval: Option<f64>,
    pub desired_interval: f64,
    pub mode: TuningMode,
    pub state: SchedulerState,
    pub preset: Preset,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Scheduler {
    config: SmeltConfig,
    preset: Preset,
    bias: Bias,
    profiles: TuningProfileResolver,
    autotune: AutoTuneEngine,
    tracking: TrackingSet,
    snapshot: IdSnapshot,
    cursor: usize,
    state: SchedulerState,
    pending_activity: Vec<ActivityEvent>,
    /// Station → actor that last loaded it; one pull per station per quantum.
    pending_autopull: BTreeMap<StationId, ActorId>,
    last_cap: usize,
    last_desired: f64,
}

impl Scheduler {
    pub fn new(config: SmeltConfig) -> Self {
        let mut scheduler = Self {
            config: SmeltConfig::default(),
            preset: Preset::Standard,
            bias: Bias::Balanced,
            profiles: TuningProfileResolver::default(),
            autotune: AutoTuneEngine::default(),
            tracking: TrackingSet::default(),
            snapshot: IdSnapshot::default(),
            cursor: 0,
            state: SchedulerState::Stopped,
            pending_activity: Vec::new(),
            pending_autopull: BTreeMap::new(),
            last_cap: 0,
            last_desired: 0.0,
        };
        scheduler.set_config(config);
        scheduler
    }

    pub fn config(&self) -> &SmeltConfig {
        &self.config
    }

    /// Replace the configuration. Free-form strings are normalized here so
    /// the quantum never sees an unknown preset or bias.
    pub fn set_config(&mut self, mut config: SmeltConfig) {
        config.normalize();
        self.preset = Preset::normalize(&config.preset);
        self.bias = Bias::normalize(&config.auto_tune.bias);
        self.profiles.resolve(&config.preset);
        self.autotune.invalidate();
        self.config = config;
    }

    pub fn tracking(&self) -> &TrackingSet {
        &self.tracking
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn effective_params(&mut self) -> EffectiveSchedulingParams {
        self.autotune.effective(
            self.config.auto_tune.enabled,
            self.config.auto_tune.population,
            self.tracking.len(),
            self.preset,
            self.bias,
            &self.config.scheduling,
        )
    }

    fn autotune_population(&self) -> u32 {
        let configured = self.config.auto_tune.population;
        if configured == 0 {
            u32::try_from(self.tracking.len()).unwrap_or(MAX_POPULATION)
        } else {
            configured
        }
        .min(MAX_POPULATION)
    }

    /// Copy the AutoTune result into the raw scheduling config when
    /// write-back is on. Returns true if the config changed.
    pub fn write_back_autotune(&mut self) -> bool {
        if !self.config.auto_tune.enabled || !self.config.auto_tune.write_back {
            return false;
        }
        let params = self.effective_params();
        let changed = write_back(&params, &mut self.config.scheduling);
        if changed {
            tracing::info!(
                min_per_tick = params.min_per_tick,
                max_per_tick = params.max_per_tick,
                "auto-tune values written back to config"
            );
        }
        changed
    }

    // -- Timer state --------------------------------------------------------

    /// Arm the scheduler. Returns the interval the driver should tick at.
    pub fn start(&mut self) -> f64 {
        let params = self.effective_params();
        let interval = desired_interval(&params, self.tracking.len());
        self.last_desired = interval;
        self.state = SchedulerState::Running { interval };
        interval
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
    }

    /// Queue a new interval. Requests made before the driver re-arms are
    /// coalesced into the latest one.
    pub fn request_reschedule(&mut self, interval: f64) {
        self.state = match self.state {
            SchedulerState::Stopped => SchedulerState::Stopped,
            SchedulerState::Running { interval: current }
            | SchedulerState::RescheduleQueued { current, .. } => {
                if (interval - current).abs() > RESCHEDULE_THRESHOLD {
                    SchedulerState::RescheduleQueued {
                        current,
                        pending: interval,
                    }
                } else {
                    SchedulerState::Running { interval: current }
                }
            }
        };
    }

    /// Hand a queued interval to the driver, which must recreate its timer.
    pub fn take_rearm(&mut self) -> Option<f64> {
        let SchedulerState::RescheduleQueued { pending, .. } = self.state else {
            return None;
        };
        self.state = SchedulerState::Running { interval: pending };
        tracing::debug!(interval = pending, "timer re-armed");
        Some(pending)
    }

    // -- Triggers -----------------------------------------------------------

    /// Queue an activity notification; it is applied at the start of the
    /// next quantum.
    pub fn notify(&mut self, event: ActivityEvent) {
        self.pending_activity.push(event);
    }

    /// Track every station the host currently knows about. Returns how many
    /// were added.
    ///
    /// Unlike host notifications this takes effect at once: it is the
    /// bootstrap a driver runs before arming the timer, not a callback.
    pub fn scan(&mut self, host: &mut dyn StationHost, now: f64) -> usize {
        let mut added = 0;
        for id in host.discover() {
            let event = ActivityEvent {
                station: id,
                kind: ActivityKind::Discovered,
            };
            if self.apply_activity(host, event, now) {
                added += 1;
            }
        }
        added
    }

    pub fn schedule_auto_pull(&mut self, station: StationId, actor: ActorId) {
        self.pending_autopull.insert(station, actor);
    }

    /// React to a player dropping a stack into a station: split ore across
    /// the inputs, queue a fuel top-up and wake an idle station.
    pub fn on_player_move(
        &mut self,
        host: &mut dyn StationHost,
        mv: &PlayerMove,
    ) -> Result<SplitOutcome, HostError> {
        if !self.config.enabled {
            return Ok(SplitOutcome::NotApplicable);
        }
        let outcome = if self.config.ore_splitting.enabled {
            split_move(host, mv, &self.config.station_whitelist)?
        } else {
            SplitOutcome::NotApplicable
        };
        self.schedule_auto_pull(mv.station, mv.actor);
        self.kick_idle_station(host, mv.station);
        Ok(outcome)
    }

    /// Ask an off station holding convertible input to start, and track it
    /// next quantum if it did.
    fn kick_idle_station(&mut self, host: &mut dyn StationHost, id: StationId) {
        if self.tracking.contains(id) {
            return;
        }
        let Some(station) = host.station_mut(id) else {
            return;
        };
        let kind = StationKind::classify(station.short_name(), &self.config.station_whitelist);
        if kind == StationKind::Unknown || station.is_on() || !has_convertible_input(station, kind)
        {
            return;
        }
        if station.force_start() {
            self.notify(ActivityEvent {
                station: id,
                kind: ActivityKind::Toggled,
            });
        }
    }

    /// The single place trackers are created and removed by notifications.
    /// Returns true if a tracker was inserted.
    fn apply_activity(&mut self, host: &mut dyn StationHost, event: ActivityEvent, now: f64) -> bool {
        let id = event.station;
        if matches!(event.kind, ActivityKind::Destroyed | ActivityKind::Unloaded) {
            if self.tracking.remove(id).is_some() {
                tracing::debug!(station = %id, kind = ?event.kind, "station untracked");
            }
            return false;
        }
        let Some(station) = host.station_mut(id) else {
            self.tracking.remove(id);
            return false;
        };
        let kind = StationKind::classify(station.short_name(), &self.config.station_whitelist);
        if kind == StationKind::Unknown || !station.is_on() {
            return false;
        }
        if event.kind == ActivityKind::Toggled {
            station.force_start();
        }
        let inserted = self.tracking.insert(id, Tracker::new(kind, now));
        if inserted {
            tracing::debug!(station = %id, ?kind, "station tracked");
        }
        inserted
    }

    fn apply_pending(&mut self, host: &mut dyn StationHost, now: f64, report: &mut QuantumReport) {
        for event in std::mem::take(&mut self.pending_activity) {
            self.apply_activity(host, event, now);
        }
        let pulls = std::mem::take(&mut self.pending_autopull);
        if !self.config.auto_pull_fuel.enabled {
            return;
        }
        let buffer = self.config.auto_pull_fuel.clamped_buffer_percent();
        for (station_id, actor_id) in pulls {
            let Some((station, actor)) = host.station_and_actor_mut(station_id, actor_id) else {
                continue;
            };
            let kind = StationKind::classify(station.short_name(), &self.config.station_whitelist);
            match pull_fuel(station, actor, kind, buffer) {
                Ok(pulled) => report.fuel_pulled += u64::from(pulled),
                Err(err) => {
                    report.faults += 1;
                    tracing::warn!(station = %station_id, actor = %actor_id, error = %err, "fuel auto-pull failed");
                }
            }
        }
    }

    // -- Quantum ------------------------------------------------------------

    /// Run one scheduling quantum at scheduler clock `now` (seconds).
    pub fn run_quantum(&mut self, host: &mut dyn StationHost, now: f64) -> QuantumReport {
        let mut report = QuantumReport::default();
        if !self.config.enabled {
            return report;
        }
        self.apply_pending(host, now, &mut report);
        if self.tracking.is_empty() {
            return report;
        }

        self.snapshot.refresh(&self.tracking);
        let params = self.effective_params();
        let cap = per_tick_cap(&params, self.snapshot.len());
        report.cap = cap;
        self.scan_from_cursor(host, now, cap, &mut report);

        report.config_written = self.write_back_autotune();
        let params = self.effective_params();
        let desired = desired_interval(&params, self.tracking.len());
        self.last_cap = cap;
        self.last_desired = desired;
        self.request_reschedule(desired);
        report
    }

    fn scan_from_cursor(
        &mut self,
        host: &mut dyn StationHost,
        now: f64,
        cap: usize,
        report: &mut QuantumReport,
    ) {
        let tuning = self.profiles.resolve(&self.config.preset);
        let ctx = CycleContext {
            tuning: &tuning,
            byproduct: &self.config.byproduct,
        };
        let ids = self.snapshot.ids();
        let n = ids.len();
        if n == 0 {
            return;
        }
        let start = self.cursor % n;

        for offset in 0..n {
            if report.processed >= cap {
                break;
            }
            let id = ids[(start + offset) % n];
            report.scanned += 1;

            let Some(station) = host.station_mut(id) else {
                if self.tracking.remove(id).is_some() {
                    report.pruned += 1;
                    tracing::debug!(station = %id, "pruned missing station");
                }
                continue;
            };
            let Some(tracker) = self.tracking.get_mut(id) else {
                continue;
            };
            if !station.is_on() {
                tracker.consecutive_off += 1;
                if tracker.consecutive_off >= OFF_EVICTION_THRESHOLD {
                    self.tracking.remove(id);
                    report.pruned += 1;
                    tracing::debug!(station = %id, "pruned station that stayed off");
                }
                continue;
            }
            tracker.consecutive_off = 0;
            if !tracker.is_due(now) {
                continue;
            }

            tracker.next_eligible = now + tuning.cycle_seconds.max(MIN_CYCLE_SECONDS);
            tracker.cycles += 1;
            report.processed += 1;
            match run_cycle(tracker, station, &ctx) {
                Ok(outcome) => report.converted += u64::from(outcome.total_converted()),
                Err(err) => {
                    report.faults += 1;
                    tracing::warn!(station = %id, error = %err, "station cycle failed");
                }
            }
        }

        self.cursor = (start + 1) % n;
    }

    pub fn status(&self) -> StatusReport {
        let mode = if self.config.auto_tune.enabled {
            TuningMode::AutoTune {
                anchor: nearest_anchor(self.autotune_population()).population,
                preset: self.preset,
                bias: self.bias,
            }
        } else {
            TuningMode::Manual
        };
        StatusReport {
            enabled: self.config.enabled,
            tracked: self.tracking.len(),
            per_tick_cap: self.last_cap,
            current_interval: self.state.current_interval(),
            desired_interval: self.last_desired,
            mode,
            state: self.state,
            preset: self.preset,
        }
    }
}

fn has_convertible_input(station: &dyn Station, kind: StationKind) -> bool {
    let storage = station.storage();
    let range = station.input_slots();
    let end = range.end.min(storage.slot_count());
    (range.start..end)
        .filter_map(|slot| storage.get(slot))
        .any(|stack| stack.amount > 0 && stack.kind.species().is_some_and(|s| kind.accepts(s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{station_with, FixtureActor, FixtureHost, FixtureStation};
    use crate::{ItemKind, ItemStack, SchedulingConfig, FUEL_ITEM};

    /// Manual scheduling with a fixed cap window.
    fn manual_config(min_per_tick: u32, max_per_tick: u32) -> SmeltConfig {
        let mut config = SmeltConfig::default();
        config.auto_tune.enabled = false;
        config.scheduling = SchedulingConfig {
            min_per_tick,
            max_per_tick,
            ..SchedulingConfig::default()
        };
        config
    }

    fn tracked(host: &mut FixtureHost, config: SmeltConfig) -> Scheduler {
        let mut scheduler = Scheduler::new(config);
        scheduler.scan(host, 0.0);
        scheduler
    }

    #[test]
    fn processed_never_exceeds_cap_or_population() {
        let mut host = FixtureHost::with_furnaces(120);
        let mut scheduler = tracked(&mut host, manual_config(25, 40));
        let report = scheduler.run_quantum(&mut host, 0.0);
        assert_eq!(report.cap, 40);
        assert_eq!(report.processed, 40);

        let mut small = FixtureHost::with_furnaces(10);
        let mut scheduler = tracked(&mut small, manual_config(25, 40));
        let report = scheduler.run_quantum(&mut small, 0.0);
        assert_eq!(report.processed, 10, "cap above population");
    }

    #[test]
    fn every_station_visited_when_cycles_outlast_quanta() {
        let mut host = FixtureHost::with_furnaces(100);
        let mut scheduler = tracked(&mut host, manual_config(25, 25));

        // 0.05 s quanta against 1 s cycles: stations already served are not
        // due again, so the cap moves on to the rest.
        for q in 0..4 {
            scheduler.run_quantum(&mut host, f64::from(q) * 0.05);
        }

        for id in scheduler.tracking().sorted_ids() {
            let cycles = scheduler.tracking().get(id).unwrap().cycles;
            assert!(cycles >= 1, "station {id} never visited");
        }
    }

    #[test]
    fn overloaded_quanta_favor_stations_after_cursor() {
        let mut host = FixtureHost::with_furnaces(100);
        let mut scheduler = tracked(&mut host, manual_config(25, 25));

        // One quantum per cycle: every station is due every time, and the
        // cursor only moves one step per quantum.
        for q in 0..4 {
            scheduler.run_quantum(&mut host, f64::from(q));
        }

        let cycles = |n: u64| scheduler.tracking().get(StationId(n)).unwrap().cycles;
        let unvisited = (1..=100).filter(|&n| cycles(n) == 0).count();
        assert_eq!(unvisited, 72);
        assert_eq!(cycles(1), 1);
        assert_eq!(cycles(10), 4);
        assert_eq!(cycles(28), 1);
        assert_eq!(cycles(29), 0);
    }

    #[test]
    fn station_fault_is_counted_and_contained() {
        let mut host = FixtureHost::with_furnaces(3);
        let faulty = host.stations.get_mut(&StationId(2)).unwrap();
        faulty.storage.locked = faulty.output.clone();
        let mut scheduler = tracked(&mut host, manual_config(25, 40));

        let report = scheduler.run_quantum(&mut host, 0.0);

        assert_eq!(report.faults, 1);
        assert_eq!(report.processed, 3);
        assert_eq!(report.converted, 20);
        for id in [StationId(1), StationId(3)] {
            assert_eq!(host.stations[&id].count(ItemKind::MetalFragments), 10);
        }
        assert_eq!(host.stations[&StationId(2)].count(ItemKind::MetalOre), 1000);
        let tracker = scheduler.tracking().get(StationId(2)).unwrap();
        assert!((tracker.next_eligible - 1.0).abs() < 1e-9, "retry waits a cycle");
        assert!(scheduler.tracking().contains(StationId(2)));
    }

    #[test]
    fn scan_tracks_at_once_but_notify_waits() {
        let mut host = FixtureHost::with_furnaces(2);
        let mut scheduler = Scheduler::new(SmeltConfig::default());

        scheduler.notify(ActivityEvent {
            station: StationId(2),
            kind: ActivityKind::Discovered,
        });
        assert!(!scheduler.tracking().contains(StationId(2)));

        assert_eq!(scheduler.scan(&mut host, 0.0), 2);
        assert!(scheduler.tracking().contains(StationId(1)));
        assert!(scheduler.tracking().contains(StationId(2)));
    }

    #[test]
    fn fixed_cap_applies_without_adaptive() {
        let mut config = manual_config(25, 40);
        config.scheduling.adaptive_enabled = false;
        let mut host = FixtureHost::with_furnaces(80);
        let mut scheduler = tracked(&mut host, config);
        let report = scheduler.run_quantum(&mut host, 0.0);
        assert_eq!(report.cap, FIXED_PER_TICK_CAP);
        assert_eq!(report.processed, FIXED_PER_TICK_CAP);
    }

    #[test]
    fn station_off_for_fifty_polls_is_dropped() {
        let mut host = FixtureHost::with_furnaces(1);
        let mut scheduler = tracked(&mut host, manual_config(25, 40));
        host.stations.get_mut(&StationId(1)).unwrap().on = false;

        for q in 0..OFF_EVICTION_THRESHOLD - 1 {
            scheduler.run_quantum(&mut host, f64::from(q));
        }
        assert!(scheduler.tracking().contains(StationId(1)), "49 off polls keep it");

        let report = scheduler.run_quantum(&mut host, 100.0);
        assert_eq!(report.pruned, 1);
        assert!(scheduler.tracking().is_empty());
    }

    #[test]
    fn missing_station_is_pruned_lazily() {
        let mut host = FixtureHost::with_furnaces(3);
        let mut scheduler = tracked(&mut host, manual_config(25, 40));
        host.stations.remove(&StationId(2));

        let report = scheduler.run_quantum(&mut host, 0.0);

        assert_eq!(report.pruned, 1);
        assert_eq!(report.processed, 2);
        assert!(!scheduler.tracking().contains(StationId(2)));
    }

    #[test]
    fn activity_is_applied_one_quantum_later() {
        let mut host = FixtureHost::with_furnaces(1);
        let mut scheduler = tracked(&mut host, manual_config(25, 40));
        let mut station = station_with(StationKind::LargeFurnace, &[], 0);
        station.id = StationId(2);
        host.add_station(station);

        scheduler.notify(ActivityEvent {
            station: StationId(2),
            kind: ActivityKind::FirstProduction,
        });
        assert!(!scheduler.tracking().contains(StationId(2)));

        scheduler.run_quantum(&mut host, 0.0);
        assert!(scheduler.tracking().contains(StationId(2)));
        assert_eq!(
            scheduler.tracking().get(StationId(2)).unwrap().kind,
            StationKind::LargeFurnace
        );

        scheduler.notify(ActivityEvent {
            station: StationId(2),
            kind: ActivityKind::Destroyed,
        });
        scheduler.run_quantum(&mut host, 1.0);
        assert!(!scheduler.tracking().contains(StationId(2)));
    }

    #[test]
    fn off_or_unlisted_stations_are_not_tracked() {
        let mut host = FixtureHost::default();
        let mut off = FixtureStation::new(StationId(1), StationKind::SmallFurnace);
        off.on = false;
        host.add_station(off);
        host.add_station(FixtureStation::new(StationId(2), StationKind::Unknown));

        let mut scheduler = Scheduler::new(SmeltConfig::default());
        assert_eq!(scheduler.scan(&mut host, 0.0), 0);
    }

    #[test]
    fn toggled_on_station_gets_force_started() {
        let mut host = FixtureHost::with_furnaces(1);
        let mut scheduler = Scheduler::new(SmeltConfig::default());
        scheduler.notify(ActivityEvent {
            station: StationId(1),
            kind: ActivityKind::Toggled,
        });
        scheduler.run_quantum(&mut host, 0.0);
        assert_eq!(host.stations[&StationId(1)].force_starts, 1);
        assert!(scheduler.tracking().contains(StationId(1)));
    }

    #[test]
    fn reschedule_requests_coalesce_until_rearmed() {
        let mut scheduler = Scheduler::new(manual_config(25, 40));
        let armed = scheduler.start();
        assert!((armed - 0.05).abs() < 1e-9, "empty set runs at the fast end");

        scheduler.request_reschedule(armed + 0.001);
        assert_eq!(scheduler.take_rearm(), None, "below threshold");

        scheduler.request_reschedule(0.1);
        scheduler.request_reschedule(0.15);
        assert_eq!(scheduler.take_rearm(), Some(0.15));
        assert_eq!(scheduler.take_rearm(), None);
        assert_eq!(scheduler.state(), SchedulerState::Running { interval: 0.15 });

        scheduler.stop();
        scheduler.request_reschedule(1.0);
        assert_eq!(scheduler.take_rearm(), None, "stopped scheduler ignores requests");
    }

    #[test]
    fn growing_population_queues_slower_interval() {
        let mut host = FixtureHost::with_furnaces(300);
        let mut scheduler = Scheduler::new(manual_config(25, 150));
        scheduler.start();
        scheduler.scan(&mut host, 0.0);

        scheduler.run_quantum(&mut host, 0.0);

        let rearm = scheduler.take_rearm().expect("interval should change");
        assert!((rearm - 0.2).abs() < 1e-9);
    }

    #[test]
    fn desired_interval_tolerates_inverted_config() {
        let params = EffectiveSchedulingParams {
            min_interval: 0.2,
            max_interval: 0.05,
            low_count_threshold: 100,
            high_count_threshold: 100,
            ..EffectiveSchedulingParams::from_raw(&SchedulingConfig::default())
        };
        assert!((desired_interval(&params, 0) - 0.05).abs() < 1e-9);
        assert!((desired_interval(&params, 101) - 0.2).abs() < 1e-9);

        let fixed = EffectiveSchedulingParams {
            dynamic_interval_enabled: false,
            fixed_interval: 10.0,
            ..params
        };
        assert!((desired_interval(&fixed, 0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn player_move_splits_and_pulls_fuel_next_quantum() {
        let mut host = FixtureHost::default();
        host.add_station(station_with(StationKind::SmallFurnace, &[], 0));
        host.add_actor(FixtureActor::new(
            ActorId(7),
            &[(ItemKind::MetalOre, 90), (FUEL_ITEM, 500)],
        ));
        let mut scheduler = Scheduler::new(SmeltConfig::default());
        let mv = PlayerMove {
            actor: ActorId(7),
            station: StationId(1),
            source_slot: 0,
            target_slot: 1,
            stack: ItemStack::new(ItemKind::MetalOre, 90),
        };

        let outcome = scheduler.on_player_move(&mut host, &mv).unwrap();
        assert_eq!(outcome, SplitOutcome::Redistributed { moved: 90 });
        assert_eq!(host.stations[&StationId(1)].count(FUEL_ITEM), 0, "pull is deferred");

        let report = scheduler.run_quantum(&mut host, 0.0);

        assert_eq!(report.fuel_pulled, 158);
        assert_eq!(host.stations[&StationId(1)].count(FUEL_ITEM), 158);
        assert_eq!(host.actors[&ActorId(7)].count(FUEL_ITEM), 342);
    }

    #[test]
    fn player_move_wakes_idle_station() {
        let mut host = FixtureHost::default();
        let mut station = station_with(StationKind::SmallFurnace, &[(ItemKind::SulfurOre, 10)], 50);
        station.on = false;
        host.add_station(station);
        host.add_actor(FixtureActor::new(ActorId(7), &[(ItemKind::SulfurOre, 10)]));
        let mut scheduler = Scheduler::new(SmeltConfig::default());
        let mv = PlayerMove {
            actor: ActorId(7),
            station: StationId(1),
            source_slot: 0,
            target_slot: 2,
            stack: ItemStack::new(ItemKind::SulfurOre, 10),
        };

        scheduler.on_player_move(&mut host, &mv).unwrap();
        assert_eq!(host.stations[&StationId(1)].force_starts, 1);

        scheduler.run_quantum(&mut host, 0.0);
        assert!(scheduler.tracking().contains(StationId(1)));
    }

    #[test]
    fn disabled_scheduler_does_nothing() {
        let mut host = FixtureHost::with_furnaces(5);
        let mut config = SmeltConfig::default();
        config.enabled = false;
        let mut scheduler = tracked(&mut host, config);
        let report = scheduler.run_quantum(&mut host, 0.0);
        assert_eq!(report, QuantumReport::default());
        assert_eq!(host.stations[&StationId(1)].count(ItemKind::MetalOre), 1000);
    }

    #[test]
    fn write_back_lands_once() {
        let mut config = SmeltConfig::default();
        config.auto_tune.write_back = true;
        config.auto_tune.population = 500;
        let mut host = FixtureHost::with_furnaces(2);
        let mut scheduler = tracked(&mut host, config);

        let first = scheduler.run_quantum(&mut host, 0.0);
        let second = scheduler.run_quantum(&mut host, 1.0);

        assert!(first.config_written);
        assert!(!second.config_written);
        assert_eq!(scheduler.config().scheduling.min_per_tick, 150);
        assert_eq!(scheduler.config().scheduling.max_per_tick, 400);
    }

    #[test]
    fn status_reports_mode_and_interval() {
        let mut host = FixtureHost::with_furnaces(90);
        let mut scheduler = Scheduler::new(SmeltConfig::default());
        scheduler.scan(&mut host, 0.0);
        scheduler.start();
        scheduler.run_quantum(&mut host, 0.0);

        let status = scheduler.status();
        assert_eq!(status.tracked, 90);
        assert_eq!(
            status.mode,
            TuningMode::AutoTune {
                anchor: 100,
                preset: Preset::Standard,
                bias: Bias::Balanced,
            }
        );
        assert!(status.current_interval.is_some());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["mode"]["mode"], "auto_tune");
        assert_eq!(json["tracked"], 90);
    }
}
