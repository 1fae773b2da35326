//! Dispatch error types.

use std::time::Duration;

use fuelwatch_state::{StateError, VehicleId};
use thiserror::Error;

/// Ways a dispatch check can end without a result.
///
/// `VehicleNotFound`, `PositionUnavailable`, and `NoStationsInRange` are
/// business outcomes the caller acts on. `Timeout`, `Store`, and `Internal`
/// are faults; see [`DispatchError::is_fault`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("vehicle not found: {0}")]
    VehicleNotFound(VehicleId),

    #[error("no current position for vehicle {0}")]
    PositionUnavailable(VehicleId),

    #[error("no stations within {radius_meters} m of vehicle {vehicle_id}")]
    NoStationsInRange {
        vehicle_id: VehicleId,
        radius_meters: f64,
    },

    #[error("dispatch check exceeded {0:?}")]
    Timeout(Duration),

    #[error("state store error: {0}")]
    Store(StateError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// True for system faults, false for legitimate business outcomes.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Store(_) | Self::Internal(_))
    }

    /// True when the same check may succeed later without a fuel change:
    /// every fault, and a missing position.
    pub fn is_retryable(&self) -> bool {
        self.is_fault() || matches!(self, Self::PositionUnavailable(_))
    }
}

impl From<StateError> for DispatchError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound { id, .. } => Self::VehicleNotFound(id),
            other => Self::Store(other),
        }
    }
}
