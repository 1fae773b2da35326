//! fuelwatchd — the fuelwatch daemon.
//!
//! Single binary that assembles all fuelwatch subsystems:
//! - State store (redb)
//! - Fuel decay scheduler
//! - Dispatch engine
//! - REST API
//!
//! # Usage
//!
//! ```text
//! fuelwatchd standalone --port 8080 --data-dir /var/lib/fuelwatch --stations stations.json
//! ```

mod seed;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fuelwatch_api::{ApiState, build_router, provider_from_config};
use fuelwatch_core::FuelwatchConfig;
use fuelwatch_decay::{DecayCallback, DecayFuture, DecayScheduler};
use fuelwatch_state::{StateStore, Vehicle};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fuelwatchd", about = "fuelwatch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every subsystem in one process.
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/fuelwatch")]
        data_dir: PathBuf,

        /// Optional TOML config file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON file of stations to load into an empty store.
        #[arg(long)]
        stations: Option<PathBuf>,

        /// Keep all state in memory; nothing survives a restart.
        #[arg(long)]
        in_memory: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,fuelwatchd=debug,fuelwatch=debug")
                }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
            stations,
            in_memory,
        } => run_standalone(port, data_dir, config, stations, in_memory).await,
    }
}

async fn run_standalone(
    port: u16,
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
    stations_path: Option<PathBuf>,
    in_memory: bool,
) -> anyhow::Result<()> {
    info!("fuelwatch daemon starting in standalone mode");

    let config = FuelwatchConfig::load(config_path.as_deref(), |key| std::env::var(key).ok())?;
    info!(
        decay_interval_ms = config.decay.interval.as_millis() as u64,
        decay_step = config.decay.step,
        threshold = config.dispatch.low_fuel_threshold,
        radius_m = config.dispatch.search_radius_meters,
        "configuration loaded"
    );

    // ── Initialize subsystems ──────────────────────────────────

    // State store.
    let store = if in_memory {
        warn!("running with an in-memory store; state is lost on exit");
        StateStore::open_in_memory()?
    } else {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join("fuelwatch.redb");
        let store = StateStore::open(&db_path)?;
        info!(path = ?db_path, "state store opened");
        store
    };

    if let Some(path) = stations_path {
        let stations = seed::load_stations(&path)?;
        seed::seed_stations(&store, &stations)?;
    }

    // API state owns the dispatch engine and reported positions.
    let identity = provider_from_config(&config.auth);
    if config.auth.tokens.is_empty() {
        warn!("no API tokens configured; accepting anonymous requests");
    }
    let api_state = ApiState::new(store.clone(), config.dispatch.clone(), identity);

    // Decay scheduler, feeding every decrement to the dispatch engine.
    let engine = Arc::clone(&api_state.engine);
    let on_decrement: DecayCallback = Arc::new(move |vehicle: Vehicle| -> DecayFuture {
        let engine = Arc::clone(&engine);
        Box::pin(async move {
            engine.on_fuel_change(&vehicle).await;
        })
    });
    let decay = DecayScheduler::new(Arc::new(store), config.decay.clone()).with_callback(on_decrement);
    info!("decay scheduler initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let decay_handle = tokio::spawn(async move {
        decay.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = build_router(api_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = decay_handle.await;

    info!("fuelwatch daemon stopped");
    Ok(())
}
