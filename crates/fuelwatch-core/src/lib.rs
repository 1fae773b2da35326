//! fuelwatch-core — shared types and configuration for fuelwatch.
//!
//! - [`GeoPoint`]: validated longitude/latitude pair plus haversine distance
//! - [`FuelwatchConfig`]: decay, dispatch, and auth settings resolved from an
//!   optional TOML file and `FUELWATCH_*` environment overrides

pub mod config;
pub mod point;

pub use config::{
    AuthConfig, ConfigError, DecayConfig, DispatchConfig, FuelwatchConfig, parse_duration,
};
pub use point::{EARTH_MEAN_RADIUS_METERS, GeoError, GeoPoint};
