//! Station seeding from a JSON file.
//!
//! The file is an array of `{ "name", "address", "coordinates": [lon, lat] }`.

use std::path::Path;

use anyhow::Context;
use fuelwatch_core::GeoPoint;
use fuelwatch_state::{NewStation, StationIndex};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct StationSeed {
    name: String,
    #[serde(default)]
    address: String,
    coordinates: [f64; 2],
}

/// Parse seed records, validating every coordinate pair.
pub fn parse_stations(json: &str) -> anyhow::Result<Vec<NewStation>> {
    let seeds: Vec<StationSeed> =
        serde_json::from_str(json).context("station seed file is not a valid JSON array")?;

    seeds
        .into_iter()
        .enumerate()
        .map(|(i, seed)| {
            let location = GeoPoint::from_lon_lat(seed.coordinates)
                .with_context(|| format!("station #{i} ({}) has bad coordinates", seed.name))?;
            Ok(NewStation::new(seed.name, seed.address, location))
        })
        .collect()
}

pub fn load_stations(path: &Path) -> anyhow::Result<Vec<NewStation>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_stations(&json)
}

/// Insert `stations` unless the index already has some.
///
/// Returns the number inserted.
pub fn seed_stations(index: &dyn StationIndex, stations: &[NewStation]) -> anyhow::Result<usize> {
    let existing = index.list_stations()?.len();
    if existing > 0 {
        info!(existing, "stations already present, skipping seed");
        return Ok(0);
    }

    for station in stations {
        index
            .add_station(station)
            .with_context(|| format!("failed to add station {}", station.name))?;
    }
    info!(count = stations.len(), "stations seeded");
    Ok(stations.len())
}
