use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use smelt_core::{QuantumReport, Scheduler, SmeltConfig};
use smelt_world::{SimWorld, WorldEvent};
use tokio::sync::broadcast;

/// Everything the quantum loop and the HTTP handlers share.
pub struct DaemonState {
    pub world: SimWorld,
    pub scheduler: Scheduler,
    pub rng: ChaCha8Rng,
    /// Scheduler clock in seconds.
    pub clock: f64,
    pub quanta: u64,
    pub last_report: QuantumReport,
    /// Simulated player actions fed in before each quantum.
    pub events_per_quantum: u32,
    /// Where AutoTune write-back and `/save` persist the config.
    pub config_path: Option<PathBuf>,
}

/// One line of the live feed: a quantum and when it ran.
#[derive(Debug, Clone, Serialize)]
pub struct QuantumEnvelope {
    pub quantum: u64,
    pub clock: f64,
    pub report: QuantumReport,
}

impl DaemonState {
    pub fn new(
        mut world: SimWorld,
        config: SmeltConfig,
        seed: u64,
        config_path: Option<PathBuf>,
    ) -> Self {
        let mut scheduler = Scheduler::new(config);
        let tracked = scheduler.scan(&mut world, 0.0);
        tracing::info!(tracked, stations = world.station_count(), "initial scan");
        Self {
            world,
            scheduler,
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock: 0.0,
            quanta: 0,
            last_report: QuantumReport::default(),
            events_per_quantum: 1,
            config_path,
        }
    }

    /// Advance the clock by `elapsed` seconds and run one quantum.
    pub fn step(&mut self, elapsed: f64) -> QuantumEnvelope {
        self.clock += elapsed;
        for _ in 0..self.events_per_quantum {
            self.feed_random_event();
        }
        let report = self.scheduler.run_quantum(&mut self.world, self.clock);
        self.quanta += 1;
        self.last_report = report;
        QuantumEnvelope {
            quantum: self.quanta,
            clock: self.clock,
            report,
        }
    }

    fn feed_random_event(&mut self) {
        match self.world.random_event(&mut self.rng) {
            Some(WorldEvent::Activity(event)) => self.scheduler.notify(event),
            Some(WorldEvent::Move(mv)) => {
                if let Err(err) = self.world.apply_player_move(&mut self.scheduler, &mv) {
                    tracing::warn!(station = %mv.station, error = %err, "player move failed");
                }
            }
            None => {}
        }
    }

    /// Snapshot the config for saving, or `None` when saving is disabled.
    /// Taken under the lock; the write itself happens after it is released.
    pub fn pending_save(&self) -> Option<PendingSave> {
        Some(PendingSave {
            path: self.config_path.clone()?,
            config: self.scheduler.config().clone(),
        })
    }
}

/// A config snapshot on its way to disk.
#[derive(Debug)]
pub struct PendingSave {
    pub path: PathBuf,
    pub config: SmeltConfig,
}

impl PendingSave {
    /// Write on the blocking pool. Failures are logged; the daemon keeps
    /// running on the in-memory config.
    pub async fn write(self) -> Option<PathBuf> {
        let Self { path, config } = self;
        let target = path.clone();
        let result =
            tokio::task::spawn_blocking(move || smelt_world::save_config(&target, &config)).await;
        match result {
            Ok(Ok(())) => {
                tracing::info!(path = %path.display(), "config saved");
                Some(path)
            }
            Ok(Err(err)) => {
                tracing::warn!(path = %path.display(), "config save failed: {err:#}");
                None
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config save task failed");
                None
            }
        }
    }
}

pub type SharedDaemon = Arc<Mutex<DaemonState>>;
pub type ReportTx = broadcast::Sender<QuantumEnvelope>;

#[derive(Clone)]
pub struct AppState {
    pub daemon: SharedDaemon,
    pub report_tx: ReportTx,
    pub paused: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(daemon: DaemonState) -> Self {
        let (report_tx, _) = broadcast::channel(256);
        Self {
            daemon: Arc::new(Mutex::new(daemon)),
            report_tx,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }
}
