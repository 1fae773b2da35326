//! Per-vehicle fuel state machine.
//!
//! Two states: `Normal` (fuel at or above the threshold) and `Low`. Only
//! the `Normal → Low` crossing triggers a station search; staying low does
//! not re-trigger, and a refuel back to `Normal` re-arms the trigger.

use std::collections::HashMap;

use fuelwatch_state::VehicleId;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelState {
    Normal,
    Low,
}

impl FuelState {
    pub fn classify(fuel: f64, threshold: f64) -> Self {
        if fuel >= threshold {
            Self::Normal
        } else {
            Self::Low
        }
    }
}

/// A change of [`FuelState`] for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelTransition {
    pub from: FuelState,
    pub to: FuelState,
}

impl FuelTransition {
    /// The one transition that starts a station search.
    pub fn triggers_search(&self) -> bool {
        self.from == FuelState::Normal && self.to == FuelState::Low
    }
}

/// Remembers the last observed state of each vehicle.
#[derive(Debug)]
pub struct FuelStateTracker {
    threshold: f64,
    states: HashMap<VehicleId, FuelState>,
}

impl FuelStateTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            states: HashMap::new(),
        }
    }

    /// Record a fuel reading. Returns the transition if the state changed.
    ///
    /// Vehicles seen for the first time are treated as coming from `Normal`.
    pub fn observe(&mut self, vehicle_id: VehicleId, fuel: f64) -> Option<FuelTransition> {
        let to = FuelState::classify(fuel, self.threshold);
        let from = self
            .states
            .insert(vehicle_id, to)
            .unwrap_or(FuelState::Normal);

        if from == to {
            return None;
        }
        debug!(vehicle_id, ?from, ?to, fuel, "fuel state changed");
        Some(FuelTransition { from, to })
    }

    /// Forget the vehicle, so its next low reading counts as a fresh crossing.
    pub fn reset(&mut self, vehicle_id: VehicleId) {
        self.states.remove(&vehicle_id);
    }

    /// Last recorded state; unseen vehicles are `Normal`.
    pub fn state(&self, vehicle_id: VehicleId) -> FuelState {
        self.states
            .get(&vehicle_id)
            .copied()
            .unwrap_or(FuelState::Normal)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
