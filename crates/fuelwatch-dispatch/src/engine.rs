//! Dispatch engine — decides whether a vehicle needs fuel and where to get it.
//!
//! Two entry points share one decision path:
//!
//! - [`DispatchEngine::check_and_dispatch`] answers an on-demand query.
//! - [`DispatchEngine::on_fuel_change`] is fed every fuel update by the decay
//!   scheduler and runs the same check when a vehicle crosses into `Low`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fuelwatch_core::{DispatchConfig, GeoPoint};
use fuelwatch_state::{
    NearbyStation, StateResult, StationIndex, Vehicle, VehicleId, VehicleRegistry,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::location::LocationSource;
use crate::tracker::{FuelState, FuelStateTracker};

/// Candidate stations for a low-fuel vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchResult {
    pub vehicle_id: VehicleId,
    /// Fuel level that triggered the search.
    pub fuel_level: f64,
    /// Nearest first, at most `max_candidates`.
    pub candidates: Vec<NearbyStation>,
    pub radius_meters: f64,
    /// Unix timestamp (seconds).
    pub checked_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dispatched(DispatchResult),
    NoActionNeeded { fuel_level: f64 },
}

pub struct DispatchEngine {
    registry: Arc<dyn VehicleRegistry>,
    index: Arc<dyn StationIndex>,
    locations: Arc<dyn LocationSource>,
    config: DispatchConfig,
    tracker: Mutex<FuelStateTracker>,
    /// Latest proactive result per vehicle.
    recent: RwLock<HashMap<VehicleId, DispatchResult>>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<dyn VehicleRegistry>,
        index: Arc<dyn StationIndex>,
        locations: Arc<dyn LocationSource>,
        config: DispatchConfig,
    ) -> Self {
        let tracker = FuelStateTracker::new(config.low_fuel_threshold);
        Self {
            registry,
            index,
            locations,
            config,
            tracker: Mutex::new(tracker),
            recent: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Check one vehicle and, if its fuel is low, find nearby stations.
    ///
    /// `position` overrides the location source. The whole check is bounded
    /// by the configured dispatch timeout.
    pub async fn check_and_dispatch(
        &self,
        vehicle_id: VehicleId,
        position: Option<GeoPoint>,
    ) -> Result<DispatchOutcome, DispatchError> {
        match tokio::time::timeout(self.config.timeout, self.evaluate(vehicle_id, position)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DispatchError::Timeout(self.config.timeout)),
        }
    }

    async fn evaluate(
        &self,
        vehicle_id: VehicleId,
        position: Option<GeoPoint>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let registry = Arc::clone(&self.registry);
        let vehicle = blocking(move || registry.get_vehicle(vehicle_id)).await?;
        let fuel_level = vehicle.current_fuel;

        if fuel_level >= self.config.low_fuel_threshold {
            debug!(vehicle_id, fuel_level, "fuel above threshold");
            return Ok(DispatchOutcome::NoActionNeeded { fuel_level });
        }

        let position = match position {
            Some(p) => p,
            None => self
                .locations
                .current_position(vehicle_id)
                .await
                .ok_or(DispatchError::PositionUnavailable(vehicle_id))?,
        };

        let index = Arc::clone(&self.index);
        let k = self.config.max_candidates;
        let radius_meters = self.config.search_radius_meters;
        let candidates = blocking(move || index.nearest(&position, k, radius_meters)).await?;

        if candidates.is_empty() {
            return Err(DispatchError::NoStationsInRange {
                vehicle_id,
                radius_meters,
            });
        }

        debug!(
            vehicle_id,
            fuel_level,
            candidates = candidates.len(),
            "stations found"
        );

        Ok(DispatchOutcome::Dispatched(DispatchResult {
            vehicle_id,
            fuel_level,
            candidates,
            radius_meters,
            checked_at: epoch_secs(),
        }))
    }

    /// Feed a fuel update. Runs a check only when the vehicle has just
    /// crossed below the threshold; returns `None` otherwise.
    ///
    /// A check that ends in a retryable error leaves the vehicle `Normal` in
    /// the tracker, so the next low reading searches again. A vehicle back
    /// above the threshold drops its cached result.
    pub async fn on_fuel_change(
        &self,
        vehicle: &Vehicle,
    ) -> Option<Result<DispatchOutcome, DispatchError>> {
        let transition = self
            .tracker
            .lock()
            .await
            .observe(vehicle.id, vehicle.current_fuel)?;
        if transition.to == FuelState::Normal {
            if self.recent.write().await.remove(&vehicle.id).is_some() {
                debug!(vehicle_id = vehicle.id, "cleared dispatch after refuel");
            }
            return None;
        }
        if !transition.triggers_search() {
            return None;
        }

        let outcome = self.check_and_dispatch(vehicle.id, None).await;
        match &outcome {
            Ok(DispatchOutcome::Dispatched(result)) => {
                info!(
                    vehicle_id = vehicle.id,
                    fuel_level = result.fuel_level,
                    nearest = %result.candidates[0].station.name,
                    candidates = result.candidates.len(),
                    "low fuel, stations dispatched"
                );
                self.recent.write().await.insert(vehicle.id, result.clone());
            }
            Ok(DispatchOutcome::NoActionNeeded { fuel_level }) => {
                // Refuelled between the decrement and the check.
                debug!(vehicle_id = vehicle.id, fuel_level, "no action needed");
                self.tracker.lock().await.reset(vehicle.id);
            }
            Err(e) => {
                if e.is_fault() {
                    warn!(vehicle_id = vehicle.id, error = %e, "proactive dispatch failed");
                } else {
                    info!(vehicle_id = vehicle.id, outcome = %e, "low fuel, no dispatch");
                }
                if e.is_retryable() {
                    self.tracker.lock().await.reset(vehicle.id);
                }
            }
        }
        Some(outcome)
    }

    /// Latest proactive results, ordered by vehicle id.
    pub async fn recent_dispatches(&self) -> Vec<DispatchResult> {
        let recent = self.recent.read().await;
        let mut results: Vec<_> = recent.values().cloned().collect();
        results.sort_by_key(|r| r.vehicle_id);
        results
    }

    pub async fn recent_dispatch(&self, vehicle_id: VehicleId) -> Option<DispatchResult> {
        self.recent.read().await.get(&vehicle_id).cloned()
    }
}

/// Run a synchronous store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, DispatchError>
where
    F: FnOnce() -> StateResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DispatchError::Internal(format!("store task failed: {e}")))?
        .map_err(DispatchError::from)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use fuelwatch_core::EARTH_MEAN_RADIUS_METERS;
    use fuelwatch_state::{NewStation, NewVehicle, StateStore};

    use crate::location::{BoxFuture, ReportedPositions};

    const ORIGIN: (f64, f64) = (77.5946, 12.9716);

    fn origin() -> GeoPoint {
        GeoPoint::new(ORIGIN.0, ORIGIN.1).unwrap()
    }

    fn north_of_origin(meters: f64) -> GeoPoint {
        let dlat = (meters / EARTH_MEAN_RADIUS_METERS).to_degrees();
        GeoPoint::new(ORIGIN.0, ORIGIN.1 + dlat).unwrap()
    }

    struct Fixture {
        store: StateStore,
        positions: ReportedPositions,
        engine: DispatchEngine,
    }

    fn fixture_with(locations: Arc<dyn LocationSource>, positions: ReportedPositions) -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let engine = DispatchEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            locations,
            DispatchConfig::default(),
        );
        Fixture {
            store,
            positions,
            engine,
        }
    }

    fn fixture() -> Fixture {
        let positions = ReportedPositions::new();
        fixture_with(Arc::new(positions.clone()), positions)
    }

    fn add_station(store: &StateStore, name: &str, meters: f64) {
        store
            .add_station(&NewStation::new(name, "", north_of_origin(meters)))
            .unwrap();
    }

    fn add_vehicle(store: &StateStore, fuel: f64) -> Vehicle {
        store
            .create_vehicle(&NewVehicle::new("van", fuel, 12.0))
            .unwrap()
    }

    /// Never answers within any reasonable timeout.
    struct StalledLocations;

    impl LocationSource for StalledLocations {
        fn current_position(&self, _vehicle_id: VehicleId) -> BoxFuture<'_, Option<GeoPoint>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                None
            })
        }
    }

    /// Stalls on the first lookup, then answers from `inner`.
    struct StallsOnce {
        stalled: AtomicBool,
        inner: ReportedPositions,
    }

    impl LocationSource for StallsOnce {
        fn current_position(&self, vehicle_id: VehicleId) -> BoxFuture<'_, Option<GeoPoint>> {
            Box::pin(async move {
                if !self.stalled.swap(true, Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                self.inner.current_position(vehicle_id).await
            })
        }
    }

    #[tokio::test]
    async fn low_fuel_dispatches_nearest_first() {
        let f = fixture();
        add_station(&f.store, "far", 4000.0);
        add_station(&f.store, "near", 1000.0);
        let v = add_vehicle(&f.store, 15.0);

        let outcome = f.engine.check_and_dispatch(v.id, Some(origin())).await.unwrap();
        let DispatchOutcome::Dispatched(result) = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(result.vehicle_id, v.id);
        assert_eq!(result.fuel_level, 15.0);
        assert_eq!(result.radius_meters, 5000.0);
        let names: Vec<_> = result
            .candidates
            .iter()
            .map(|c| c.station.name.as_str())
            .collect();
        assert_eq!(names, vec!["near", "far"]);
    }

    #[tokio::test]
    async fn at_or_above_threshold_needs_no_action() {
        let f = fixture();
        add_station(&f.store, "near", 100.0);

        for fuel in [20.0, 55.0] {
            let v = add_vehicle(&f.store, fuel);
            let outcome = f.engine.check_and_dispatch(v.id, Some(origin())).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::NoActionNeeded { fuel_level: fuel });
        }
    }

    #[tokio::test]
    async fn no_action_needed_even_without_stations() {
        let f = fixture();
        let v = add_vehicle(&f.store, 30.0);
        let outcome = f.engine.check_and_dispatch(v.id, None).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NoActionNeeded { .. }));
    }

    #[tokio::test]
    async fn no_stations_in_range() {
        let f = fixture();
        add_station(&f.store, "remote", 12_000.0);
        let v = add_vehicle(&f.store, 5.0);

        let err = f
            .engine
            .check_and_dispatch(v.id, Some(origin()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::NoStationsInRange { radius_meters, .. } if radius_meters == 5000.0
        ));
        assert!(!err.is_fault());
    }

    #[tokio::test]
    async fn unknown_vehicle() {
        let f = fixture();
        let err = f.engine.check_and_dispatch(99, Some(origin())).await.unwrap_err();
        assert!(matches!(err, DispatchError::VehicleNotFound(99)));
    }

    #[tokio::test]
    async fn missing_position_is_reported() {
        let f = fixture();
        add_station(&f.store, "near", 100.0);
        let v = add_vehicle(&f.store, 5.0);

        let err = f.engine.check_and_dispatch(v.id, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::PositionUnavailable(id) if id == v.id));
    }

    #[tokio::test]
    async fn falls_back_to_reported_position() {
        let f = fixture();
        add_station(&f.store, "near", 300.0);
        let v = add_vehicle(&f.store, 5.0);
        f.positions.report(v.id, origin()).await;

        let outcome = f.engine.check_and_dispatch(v.id, None).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched(_)));
    }

    #[tokio::test]
    async fn slow_location_source_times_out() {
        let positions = ReportedPositions::new();
        let mut f = fixture_with(Arc::new(StalledLocations), positions);
        f.engine.config.timeout = Duration::from_millis(50);
        let v = add_vehicle(&f.store, 5.0);

        let err = f.engine.check_and_dispatch(v.id, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
        assert!(err.is_fault());
    }

    #[tokio::test]
    async fn proactive_check_fires_once_per_crossing() {
        let f = fixture();
        add_station(&f.store, "near", 500.0);
        let v = add_vehicle(&f.store, 21.0);
        f.positions.report(v.id, origin()).await;

        assert!(f.engine.on_fuel_change(&v).await.is_none());

        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        assert_eq!(v.current_fuel, 20.0);
        assert!(f.engine.on_fuel_change(&v).await.is_none());

        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        let outcome = f.engine.on_fuel_change(&v).await.unwrap().unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched(_)));

        // Still low: no second search.
        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        assert!(f.engine.on_fuel_change(&v).await.is_none());

        let cached = f.engine.recent_dispatch(v.id).await.unwrap();
        assert_eq!(cached.fuel_level, 19.0);
        assert_eq!(f.engine.recent_dispatches().await.len(), 1);
    }

    #[tokio::test]
    async fn refuel_rearms_proactive_check() {
        let f = fixture();
        add_station(&f.store, "near", 500.0);
        let v = add_vehicle(&f.store, 10.0);
        f.positions.report(v.id, origin()).await;

        assert!(f.engine.on_fuel_change(&v).await.is_some());

        assert!(f.engine.recent_dispatch(v.id).await.is_some());

        let v = f.store.adjust_fuel(v.id, 30.0).unwrap();
        assert!(f.engine.on_fuel_change(&v).await.is_none());
        assert!(f.engine.recent_dispatch(v.id).await.is_none());
        assert!(f.engine.recent_dispatches().await.is_empty());

        let v = f.store.decrement_fuel(v.id, 25.0).unwrap();
        assert!(f.engine.on_fuel_change(&v).await.is_some());
        assert_eq!(f.engine.recent_dispatch(v.id).await.unwrap().fuel_level, 15.0);
    }

    #[tokio::test]
    async fn timed_out_proactive_check_retries_on_next_reading() {
        let positions = ReportedPositions::new();
        let source = StallsOnce {
            stalled: AtomicBool::new(false),
            inner: positions.clone(),
        };
        let mut f = fixture_with(Arc::new(source), positions);
        f.engine.config.timeout = Duration::from_millis(50);
        add_station(&f.store, "near", 500.0);
        let v = add_vehicle(&f.store, 20.0);
        f.positions.report(v.id, origin()).await;

        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        let first = f.engine.on_fuel_change(&v).await.unwrap();
        assert!(matches!(first, Err(DispatchError::Timeout(_))));
        assert!(f.engine.recent_dispatch(v.id).await.is_none());

        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        let retry = f.engine.on_fuel_change(&v).await.unwrap().unwrap();
        assert!(matches!(retry, DispatchOutcome::Dispatched(_)));
        assert_eq!(f.engine.recent_dispatch(v.id).await.unwrap().fuel_level, 18.0);

        // Settled: no further searches while still low.
        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        assert!(f.engine.on_fuel_change(&v).await.is_none());
    }

    #[tokio::test]
    async fn missing_position_retries_once_reported() {
        let f = fixture();
        add_station(&f.store, "near", 500.0);
        let v = add_vehicle(&f.store, 10.0);

        let first = f.engine.on_fuel_change(&v).await.unwrap();
        assert!(matches!(first, Err(DispatchError::PositionUnavailable(_))));

        f.positions.report(v.id, origin()).await;
        let outcome = f.engine.on_fuel_change(&v).await.unwrap().unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched(_)));
    }

    #[tokio::test]
    async fn no_stations_in_range_is_not_retried() {
        let f = fixture();
        add_station(&f.store, "remote", 20_000.0);
        let v = add_vehicle(&f.store, 10.0);
        f.positions.report(v.id, origin()).await;

        let first = f.engine.on_fuel_change(&v).await.unwrap();
        assert!(matches!(first, Err(DispatchError::NoStationsInRange { .. })));

        let v = f.store.decrement_fuel(v.id, 1.0).unwrap();
        assert!(f.engine.on_fuel_change(&v).await.is_none());
    }

    #[tokio::test]
    async fn failed_proactive_check_is_not_cached() {
        let f = fixture();
        let v = add_vehicle(&f.store, 10.0);

        let outcome = f.engine.on_fuel_change(&v).await.unwrap();
        assert!(matches!(outcome, Err(DispatchError::PositionUnavailable(_))));
        assert!(f.engine.recent_dispatches().await.is_empty());
    }
}
