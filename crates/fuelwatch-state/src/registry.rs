//! Vehicle registry contract.
//!
//! The dispatch engine and decay scheduler are written against this trait
//! rather than against [`StateStore`] so other persistence backends (and
//! fault-injecting fakes in tests) can stand in.

use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::types::{NewVehicle, Vehicle, VehicleId};

/// Exclusive owner of vehicle records. Every mutation is atomic per id.
pub trait VehicleRegistry: Send + Sync {
    /// Look up a vehicle; unknown ids are [`StateError::NotFound`].
    fn get_vehicle(&self, id: VehicleId) -> StateResult<Vehicle>;

    /// All vehicles in id order.
    fn list_vehicles(&self) -> StateResult<Vec<Vehicle>>;

    /// Register a new vehicle.
    fn create_vehicle(&self, req: &NewVehicle) -> StateResult<Vehicle>;

    /// Remove `amount` liters, clamped at zero; no-op on an empty tank.
    fn decrement_fuel(&self, id: VehicleId, amount: f64) -> StateResult<Vehicle>;

    /// Add (or remove) `delta` liters, clamped at zero. Used for refuels.
    fn adjust_fuel(&self, id: VehicleId, delta: f64) -> StateResult<Vehicle>;
}

impl VehicleRegistry for StateStore {
    fn get_vehicle(&self, id: VehicleId) -> StateResult<Vehicle> {
        self.find_vehicle(id)?
            .ok_or(StateError::NotFound { kind: "vehicle", id })
    }

    fn list_vehicles(&self) -> StateResult<Vec<Vehicle>> {
        self.all_vehicles()
    }

    fn create_vehicle(&self, req: &NewVehicle) -> StateResult<Vehicle> {
        self.insert_vehicle(req)
    }

    fn decrement_fuel(&self, id: VehicleId, amount: f64) -> StateResult<Vehicle> {
        self.decrement_vehicle_fuel(id, amount)
    }

    fn adjust_fuel(&self, id: VehicleId, delta: f64) -> StateResult<Vehicle> {
        self.adjust_vehicle_fuel(id, delta)
    }
}
