//! Vehicle position lookup.
//!
//! The dispatch engine never stores positions itself. It asks a
//! [`LocationSource`] when a check arrives without explicit coordinates.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fuelwatch_core::GeoPoint;
use fuelwatch_state::VehicleId;
use tokio::sync::RwLock;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provides the current position of a vehicle, if one is known.
pub trait LocationSource: Send + Sync {
    fn current_position(&self, vehicle_id: VehicleId) -> BoxFuture<'_, Option<GeoPoint>>;
}

/// Positions most recently reported by vehicles through the API.
#[derive(Debug, Clone, Default)]
pub struct ReportedPositions {
    positions: Arc<RwLock<HashMap<VehicleId, GeoPoint>>>,
}

impl ReportedPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest position, replacing any earlier report.
    pub async fn report(&self, vehicle_id: VehicleId, position: GeoPoint) {
        self.positions.write().await.insert(vehicle_id, position);
    }

    pub async fn forget(&self, vehicle_id: VehicleId) {
        self.positions.write().await.remove(&vehicle_id);
    }
}

impl LocationSource for ReportedPositions {
    fn current_position(&self, vehicle_id: VehicleId) -> BoxFuture<'_, Option<GeoPoint>> {
        Box::pin(async move { self.positions.read().await.get(&vehicle_id).copied() })
    }
}
