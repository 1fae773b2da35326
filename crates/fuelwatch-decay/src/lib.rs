//! fuelwatch-decay — simulated fuel consumption.
//!
//! A single background task removes a fixed step of fuel from every
//! vehicle with fuel remaining, once per interval. Failures are isolated
//! per vehicle and per tick; the loop only stops on shutdown.

pub mod scheduler;

pub use scheduler::{DecayCallback, DecayFuture, DecayScheduler, TickReport};
