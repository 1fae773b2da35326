//! Geographic positions and great-circle distance.
//!
//! Distances use the haversine formula on a sphere of mean Earth radius
//! (6 371 008.8 m). Against the WGS84 ellipsoid the spherical model is off
//! by at most ~0.5% of the distance, i.e. no more than ~25 m at the default
//! 5 km search radius. Within a single search that error shifts all
//! candidates almost identically, so nearest-first ordering is unaffected
//! except for near-ties.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters used by the haversine metric.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Errors raised when a coordinate pair is out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("longitude {0} out of range [-180, 180]")]
    Longitude(f64),

    #[error("latitude {0} out of range [-90, 90]")]
    Latitude(f64),
}

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.longitude, raw.latitude)
    }
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::Longitude(longitude));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::Latitude(latitude));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Build a point from a `[longitude, latitude]` pair.
    pub fn from_lon_lat(pair: [f64; 2]) -> Result<Self, GeoError> {
        Self::new(pair[0], pair[1])
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        Haversine.distance(Point::from(*self), Point::from(*other))
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.longitude, p.latitude)
    }
}
