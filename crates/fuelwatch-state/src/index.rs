//! Station index — nearest-station queries.
//!
//! Stations are few and immutable, so `nearest` is a linear scan over the
//! id-ordered table followed by a stable sort on haversine distance. The
//! stable sort over insertion order is what breaks distance ties.

use fuelwatch_core::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{NewStation, Station};

/// A station returned by a nearest-neighbour query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearbyStation {
    pub station: Station,
    pub distance_meters: f64,
}

/// Exclusive owner of station records.
pub trait StationIndex: Send + Sync {
    fn add_station(&self, req: &NewStation) -> StateResult<Station>;

    /// All stations in insertion order.
    fn list_stations(&self) -> StateResult<Vec<Station>>;

    /// Up to `k` stations within `max_distance_meters` of `point`,
    /// nearest first. No match is an empty vec, not an error.
    fn nearest(
        &self,
        point: &GeoPoint,
        k: usize,
        max_distance_meters: f64,
    ) -> StateResult<Vec<NearbyStation>>;
}

impl StationIndex for StateStore {
    fn add_station(&self, req: &NewStation) -> StateResult<Station> {
        self.insert_station(req)
    }

    fn list_stations(&self) -> StateResult<Vec<Station>> {
        self.all_stations()
    }

    fn nearest(
        &self,
        point: &GeoPoint,
        k: usize,
        max_distance_meters: f64,
    ) -> StateResult<Vec<NearbyStation>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        Ok(rank_nearest(
            self.all_stations()?,
            point,
            k,
            max_distance_meters,
        ))
    }
}

/// Rank `stations` (given in insertion order) by distance from `point`.
pub fn rank_nearest(
    stations: impl IntoIterator<Item = Station>,
    point: &GeoPoint,
    k: usize,
    max_distance_meters: f64,
) -> Vec<NearbyStation> {
    let mut within: Vec<NearbyStation> = stations
        .into_iter()
        .filter_map(|station| {
            let distance_meters = point.distance_meters(&station.location);
            (distance_meters <= max_distance_meters).then_some(NearbyStation {
                station,
                distance_meters,
            })
        })
        .collect();

    // `sort_by` is stable: equal distances keep insertion order.
    within.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    within.truncate(k);
    within
}
