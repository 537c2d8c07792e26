use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;
mod tick_loop;

use state::{AppState, DaemonState};

#[derive(Parser)]
#[command(name = "smelt_daemon", about = "Run the smelting scheduler against a demo world")]
struct Args {
    /// Config file; created from defaults on first save if missing.
    #[arg(long, default_value = smelt_world::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Never write the config back (AutoTune write-back and /save).
    #[arg(long)]
    no_save: bool,
    #[arg(long, default_value_t = 300)]
    stations: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 3002)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Simulated player actions per quantum.
    #[arg(long, default_value_t = 1)]
    events_per_quantum: u32,
    /// Stop after this many quanta.
    #[arg(long)]
    max_quanta: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = smelt_world::load_or_default(&args.config)?;
    let world = smelt_world::build_demo_world(args.stations, args.seed)?;
    let config_path = (!args.no_save).then(|| args.config.clone());

    let mut daemon = DaemonState::new(world, config, args.seed, config_path);
    daemon.events_per_quantum = args.events_per_quantum;
    let interval = daemon.scheduler.start();
    tracing::info!(interval, preset = ?daemon.scheduler.status().preset, "scheduler started");

    let app_state = AppState::new(daemon);
    let router = routes::make_router_with_cors(app_state.clone(), &args.cors_origin);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");

    let quantum_loop = tokio::spawn(tick_loop::run_quantum_loop(
        app_state,
        interval,
        args.max_quanta,
    ));

    tokio::select! {
        result = axum::serve(listener, router) => result.context("http server")?,
        result = quantum_loop => {
            result.context("quantum loop panicked")?;
            tracing::info!("quantum limit reached, shutting down");
        }
    }
    Ok(())
}
