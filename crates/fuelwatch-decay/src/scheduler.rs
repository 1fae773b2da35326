//! Decay scheduler — background task that drains fuel on a fixed cadence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fuelwatch_core::DecayConfig;
use fuelwatch_state::{Vehicle, VehicleRegistry};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Callback invoked with the updated vehicle after each decrement.
///
/// The daemon uses this to feed the dispatch engine.
pub type DecayCallback = Arc<dyn Fn(Vehicle) -> DecayFuture + Send + Sync>;

pub type DecayFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Counts from one pass over the fleet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub decremented: usize,
    /// Vehicles already at zero.
    pub skipped: usize,
    pub failed: usize,
}

pub struct DecayScheduler {
    registry: Arc<dyn VehicleRegistry>,
    config: DecayConfig,
    on_decrement: Option<DecayCallback>,
}

impl DecayScheduler {
    pub fn new(registry: Arc<dyn VehicleRegistry>, config: DecayConfig) -> Self {
        Self {
            registry,
            config,
            on_decrement: None,
        }
    }

    pub fn with_callback(mut self, callback: DecayCallback) -> Self {
        self.on_decrement = Some(callback);
        self
    }

    /// Decrement every vehicle with fuel remaining by one step.
    ///
    /// Store writes run on the blocking pool. A vehicle that fails is logged
    /// and counted; the rest of the batch still runs. A failed listing
    /// aborts only this tick. Callbacks for the updated vehicles run
    /// concurrently and the tick returns once all of them have finished.
    pub async fn tick(&self) -> TickReport {
        let registry = Arc::clone(&self.registry);
        let step = self.config.step;
        let (report, updated) =
            match tokio::task::spawn_blocking(move || sweep(&*registry, step)).await {
                Ok(swept) => swept,
                Err(e) => {
                    error!(error = %e, "decay tick: sweep task failed");
                    return TickReport::default();
                }
            };

        if let Some(ref callback) = self.on_decrement {
            let mut pending = JoinSet::new();
            for vehicle in updated {
                pending.spawn(callback(vehicle));
            }
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "decay callback failed");
                }
            }
        }

        debug!(
            decremented = report.decremented,
            skipped = report.skipped,
            failed = report.failed,
            "decay tick complete"
        );
        report
    }

    /// Run the decay loop until the shutdown signal fires.
    ///
    /// A tick in progress is finished before shutdown is observed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            step = self.config.step,
            "decay scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("decay scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// One synchronous pass over the fleet. Returns the updated vehicles.
fn sweep(registry: &dyn VehicleRegistry, step: f64) -> (TickReport, Vec<Vehicle>) {
    let mut report = TickReport::default();
    let mut updated = Vec::new();

    let vehicles = match registry.list_vehicles() {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "decay tick: failed to list vehicles");
            return (report, updated);
        }
    };

    for vehicle in vehicles {
        if vehicle.current_fuel <= 0.0 {
            report.skipped += 1;
            continue;
        }

        match registry.decrement_fuel(vehicle.id, step) {
            Ok(v) => {
                report.decremented += 1;
                updated.push(v);
            }
            Err(e) => {
                report.failed += 1;
                warn!(vehicle_id = vehicle.id, error = %e, "fuel decrement failed");
            }
        }
    }
    (report, updated)
}
