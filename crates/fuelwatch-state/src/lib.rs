//! fuelwatch-state — embedded state store for fuelwatch.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for vehicles and refuelling stations.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns
//! under sequential `u64` keys, so a table scan yields insertion order.
//!
//! Two traits describe what the rest of the system needs from storage:
//!
//! - [`VehicleRegistry`]: vehicle lookup plus atomic per-vehicle fuel
//!   mutation (decrement for decay, adjust for refuels)
//! - [`StationIndex`]: station storage and nearest-neighbour queries
//!
//! The `StateStore` implements both, is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`), and can be shared across async tasks.

pub mod error;
pub mod index;
pub mod registry;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use index::{NearbyStation, StationIndex, rank_nearest};
pub use registry::VehicleRegistry;
pub use store::StateStore;
pub use types::*;
