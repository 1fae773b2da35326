//! Domain types for the fuelwatch state store.
//!
//! These types are the persisted records for vehicles and refuelling
//! stations. All are JSON-serializable for storage in redb tables and for
//! the REST API.

use fuelwatch_core::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Unique identifier for a vehicle.
pub type VehicleId = u64;

/// Unique identifier for a refuelling station.
pub type StationId = u64;

// ── Vehicle ────────────────────────────────────────────────────────

/// A tracked vehicle and its live fuel level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    /// Liters in the tank. Never negative.
    pub current_fuel: f64,
    /// Informational only; decay does not read it.
    pub mileage: f64,
    /// Unix timestamp (seconds) when the vehicle was registered.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last fuel change.
    pub updated_at: u64,
}

/// Registration request for a new vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVehicle {
    pub name: String,
    pub initial_fuel: f64,
    #[serde(default)]
    pub mileage: f64,
}

impl NewVehicle {
    pub fn new(name: impl Into<String>, initial_fuel: f64, mileage: f64) -> Self {
        Self {
            name: name.into(),
            initial_fuel,
            mileage,
        }
    }

    /// Reject empty names and negative or non-finite quantities.
    pub fn validate(&self) -> StateResult<()> {
        if self.name.trim().is_empty() {
            return Err(StateError::Validation {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        require_non_negative("initial_fuel", self.initial_fuel)?;
        require_non_negative("mileage", self.mileage)?;
        Ok(())
    }
}

// ── Station ────────────────────────────────────────────────────────

/// A refuelling station. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub created_at: u64,
}

/// Request to add a station to the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStation {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub location: GeoPoint,
}

impl NewStation {
    pub fn new(name: impl Into<String>, address: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            location,
        }
    }

    pub fn validate(&self) -> StateResult<()> {
        if self.name.trim().is_empty() {
            return Err(StateError::Validation {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn require_non_negative(field: &'static str, value: f64) -> StateResult<()> {
    if !value.is_finite() {
        return Err(StateError::Validation {
            field,
            reason: format!("{value} is not a finite number"),
        });
    }
    if value < 0.0 {
        return Err(StateError::Validation {
            field,
            reason: format!("{value} is negative"),
        });
    }
    Ok(())
}

pub(crate) fn require_finite(field: &'static str, value: f64) -> StateResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StateError::Validation {
            field,
            reason: format!("{value} is not a finite number"),
        })
    }
}
