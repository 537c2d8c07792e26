use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use smelt_core::autotune::{derive, ANCHORS};
use smelt_core::{Bias, Preset, QuantumReport, Scheduler, SmeltConfig, StatusReport};
use smelt_world::{build_demo_world, load_or_default, WorldEvent};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "smelt_cli", about = "Smelting scheduler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler headless against a demo world on a simulated clock.
    Run {
        #[arg(long)]
        quanta: u64,
        #[arg(long, default_value_t = 300)]
        stations: usize,
        /// World seed; random if omitted.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = smelt_world::DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Override the configured preset.
        #[arg(long)]
        preset: Option<String>,
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        /// Simulated player actions per quantum.
        #[arg(long, default_value_t = 1)]
        events_per_quantum: u32,
        /// Write the final status and totals as JSON here.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Print the AutoTune parameters for each population anchor.
    Tune {
        #[arg(long, default_value = "standard")]
        preset: String,
        #[arg(long, default_value = "balanced")]
        bias: String,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
struct Totals {
    quanta: u64,
    clock: f64,
    processed: u64,
    converted: u64,
    fuel_pulled: u64,
    pruned: u64,
    faults: u64,
    rearms: u64,
}

impl Totals {
    fn add(&mut self, report: &QuantumReport) {
        self.quanta += 1;
        self.processed += report.processed as u64;
        self.converted += report.converted;
        self.fuel_pulled += report.fuel_pulled;
        self.pruned += report.pruned as u64;
        self.faults += report.faults as u64;
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    seed: u64,
    stations: usize,
    totals: &'a Totals,
    status: StatusReport,
}

struct RunArgs {
    quanta: u64,
    stations: usize,
    seed: Option<u64>,
    config: PathBuf,
    preset: Option<String>,
    print_every: u64,
    events_per_quantum: u32,
    summary: Option<PathBuf>,
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load_or_default(&args.config)?;
    if let Some(preset) = args.preset {
        config.preset = preset;
    }
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut world = build_demo_world(args.stations, seed)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut scheduler = Scheduler::new(config);

    let tracked = scheduler.scan(&mut world, 0.0);
    let mut interval = scheduler.start();
    let mut totals = Totals::default();

    println!(
        "Starting run: quanta={} stations={} tracked={tracked} seed={seed} preset={}",
        args.quanta,
        args.stations,
        scheduler.config().preset,
    );
    println!("{}", "-".repeat(80));

    let print_every = args.print_every.max(1);
    for _ in 0..args.quanta {
        totals.clock += interval;
        for _ in 0..args.events_per_quantum {
            match world.random_event(&mut rng) {
                Some(WorldEvent::Activity(event)) => scheduler.notify(event),
                Some(WorldEvent::Move(mv)) => {
                    world
                        .apply_player_move(&mut scheduler, &mv)
                        .with_context(|| format!("player move into station {}", mv.station))?;
                }
                None => {}
            }
        }
        let report = scheduler.run_quantum(&mut world, totals.clock);
        totals.add(&report);
        if let Some(next) = scheduler.take_rearm() {
            interval = next;
            totals.rearms += 1;
        }
        if totals.quanta % print_every == 0 {
            print_status(&totals, &scheduler.status(), &report);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done after {} quanta ({:.1}s simulated):", totals.quanta, totals.clock);
    let status = scheduler.status();
    println!(
        "  processed={}  converted={}  fuel_pulled={}  pruned={}  faults={}  rearms={}",
        totals.processed,
        totals.converted,
        totals.fuel_pulled,
        totals.pruned,
        totals.faults,
        totals.rearms,
    );

    if let Some(path) = args.summary {
        let summary = Summary {
            seed,
            stations: args.stations,
            totals: &totals,
            status,
        };
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }
    Ok(())
}

fn print_status(totals: &Totals, status: &StatusReport, last: &QuantumReport) {
    println!(
        "[q={q:05}  t={t:8.2}s]  tracked={tracked:4}  cap={cap:4}  \
         interval={interval:.3}s  ran={ran:3}  converted={converted}",
        q = totals.quanta,
        t = totals.clock,
        tracked = status.tracked,
        cap = status.per_tick_cap,
        interval = status.current_interval.unwrap_or(status.desired_interval),
        ran = last.processed,
        converted = totals.converted,
    );
}

fn tune(preset: &str, bias: &str) {
    let preset = Preset::normalize(preset);
    let bias = Bias::normalize(bias);
    let raw = SmeltConfig::default().scheduling;
    println!("AutoTune: preset={} bias={}", preset.as_str(), bias.as_str());
    println!("{}", "-".repeat(80));
    println!(
        "{:>6}  {:>9}  {:>9}  {:>8}  {:>8}  {:>6}  {:>6}",
        "pop", "min/tick", "max/tick", "min_s", "max_s", "low", "high"
    );
    for anchor in &ANCHORS {
        let p = derive(anchor.population, preset, bias, &raw);
        println!(
            "{:>6}  {:>9}  {:>9}  {:>8.3}  {:>8.3}  {:>6}  {:>6}",
            anchor.population,
            p.min_per_tick,
            p.max_per_tick,
            p.min_interval,
            p.max_interval,
            p.low_count_threshold,
            p.high_count_threshold,
        );
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            quanta,
            stations,
            seed,
            config,
            preset,
            print_every,
            events_per_quantum,
            summary,
        } => run(RunArgs {
            quanta,
            stations,
            seed,
            config,
            preset,
            print_every,
            events_per_quantum,
            summary,
        })?,
        Commands::Tune { preset, bias } => tune(&preset, &bias),
    }
    Ok(())
}
