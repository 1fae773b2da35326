//! fuelwatch-dispatch — low-fuel detection and station dispatch.
//!
//! # Architecture
//!
//! ```text
//! DecayScheduler ──on_fuel_change──► DispatchEngine ◄── API (on demand)
//!                                      ├── FuelStateTracker (Normal / Low)
//!                                      ├── VehicleRegistry  (fuel level)
//!                                      ├── LocationSource   (position)
//!                                      └── StationIndex     (nearest k)
//! ```

pub mod engine;
pub mod error;
pub mod location;
pub mod tracker;

pub use engine::{DispatchEngine, DispatchOutcome, DispatchResult};
pub use error::DispatchError;
pub use location::{BoxFuture, LocationSource, ReportedPositions};
pub use tracker::{FuelState, FuelStateTracker, FuelTransition};
