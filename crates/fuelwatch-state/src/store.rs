//! StateStore — redb-backed state persistence for fuelwatch.
//!
//! Provides typed operations over vehicles and stations. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Fuel mutations read, modify, and write the record inside one write
//! transaction. redb admits a single writer at a time, so concurrent
//! mutations of the same vehicle are serialized and none is lost.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, WriteTransaction};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(VEHICLES).map_err(map_err!(Table))?;
        txn.open_table(STATIONS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Allocate the next id for `table` within an open write transaction.
    fn next_id(txn: &WriteTransaction, table: &str) -> StateResult<u64> {
        let mut seq = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        let last = seq
            .get(table)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = last + 1;
        seq.insert(table, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    // ── Vehicles ───────────────────────────────────────────────────

    /// Register a vehicle and assign it an id.
    pub fn insert_vehicle(&self, req: &NewVehicle) -> StateResult<Vehicle> {
        req.validate()?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let vehicle = {
            let id = Self::next_id(&txn, "vehicles")?;
            let now = epoch_secs();
            let vehicle = Vehicle {
                id,
                name: req.name.trim().to_string(),
                current_fuel: req.initial_fuel,
                mileage: req.mileage,
                created_at: now,
                updated_at: now,
            };
            let value = serde_json::to_vec(&vehicle).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(VEHICLES).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            vehicle
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = vehicle.id, name = %vehicle.name, "vehicle stored");
        Ok(vehicle)
    }

    /// Get a vehicle by id.
    pub fn find_vehicle(&self, id: VehicleId) -> StateResult<Option<Vehicle>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VEHICLES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let vehicle: Vehicle =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(vehicle))
            }
            None => Ok(None),
        }
    }

    /// List all vehicles in id order.
    pub fn all_vehicles(&self) -> StateResult<Vec<Vehicle>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VEHICLES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let vehicle: Vehicle =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(vehicle);
        }
        Ok(results)
    }

    /// Atomically apply `f` to a vehicle's fuel level.
    ///
    /// `f` returns the new level, or `None` to leave the record untouched.
    /// The result is clamped at zero before it is written.
    fn update_fuel<F>(&self, id: VehicleId, f: F) -> StateResult<Vehicle>
    where
        F: FnOnce(f64) -> Option<f64>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let (vehicle, changed) = {
            let mut table = txn.open_table(VEHICLES).map_err(map_err!(Table))?;
            let current: Option<Vehicle> = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            let mut vehicle = current.ok_or(StateError::NotFound { kind: "vehicle", id })?;

            match f(vehicle.current_fuel) {
                Some(level) => {
                    vehicle.current_fuel = level.max(0.0);
                    vehicle.updated_at = epoch_secs();
                    let value = serde_json::to_vec(&vehicle).map_err(map_err!(Serialize))?;
                    table
                        .insert(id, value.as_slice())
                        .map_err(map_err!(Write))?;
                    (vehicle, true)
                }
                None => (vehicle, false),
            }
        };
        if changed {
            txn.commit().map_err(map_err!(Transaction))?;
        } else {
            txn.abort().map_err(map_err!(Transaction))?;
        }
        Ok(vehicle)
    }

    /// Remove `amount` liters, clamping at zero. A vehicle that is already
    /// empty is returned unchanged without a write.
    pub fn decrement_vehicle_fuel(&self, id: VehicleId, amount: f64) -> StateResult<Vehicle> {
        require_non_negative("amount", amount)?;
        let vehicle = self.update_fuel(id, |fuel| (fuel > 0.0).then(|| fuel - amount))?;
        debug!(id, fuel = vehicle.current_fuel, "vehicle fuel decremented");
        Ok(vehicle)
    }

    /// Add `delta` liters (negative to drain), clamping at zero.
    pub fn adjust_vehicle_fuel(&self, id: VehicleId, delta: f64) -> StateResult<Vehicle> {
        require_finite("delta", delta)?;
        let vehicle = self.update_fuel(id, |fuel| Some(fuel + delta))?;
        debug!(id, delta, fuel = vehicle.current_fuel, "vehicle fuel adjusted");
        Ok(vehicle)
    }

    // ── Stations ───────────────────────────────────────────────────

    /// Store a station and assign it an id.
    pub fn insert_station(&self, req: &NewStation) -> StateResult<Station> {
        req.validate()?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let station = {
            let id = Self::next_id(&txn, "stations")?;
            let station = Station {
                id,
                name: req.name.trim().to_string(),
                address: req.address.clone(),
                location: req.location,
                created_at: epoch_secs(),
            };
            let value = serde_json::to_vec(&station).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(STATIONS).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            station
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = station.id, name = %station.name, "station stored");
        Ok(station)
    }

    /// List all stations in insertion order.
    pub fn all_stations(&self) -> StateResult<Vec<Station>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let station: Station =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(station);
        }
        Ok(results)
    }

    /// Number of stored stations.
    pub fn station_count(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATIONS).map_err(map_err!(Table))?;
        table.len().map_err(map_err!(Read))
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
