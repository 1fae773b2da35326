//! fuelwatch-api — REST API for fuelwatch.
//!
//! Provides axum route handlers for vehicles, stations, and dispatch
//! checks. Every `/api/v1` route requires a caller identity resolved from
//! the bearer token.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness (no auth) |
//! | GET | `/api/v1/vehicles` | List vehicles |
//! | POST | `/api/v1/vehicles` | Register a vehicle |
//! | GET | `/api/v1/vehicles/{id}` | Get a vehicle |
//! | POST | `/api/v1/vehicles/{id}/refuel` | Add fuel |
//! | PUT | `/api/v1/vehicles/{id}/position` | Report current position |
//! | GET | `/api/v1/vehicles/{id}/dispatch` | Low-fuel check and station search |
//! | GET | `/api/v1/dispatches` | Recent proactive dispatches |
//! | GET | `/api/v1/stations` | List stations |

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fuelwatch_core::DispatchConfig;
use fuelwatch_dispatch::{DispatchEngine, ReportedPositions};
use fuelwatch_state::{StateStore, StationIndex, VehicleRegistry};

pub use auth::{
    Anonymous, AuthFailure, CallerIdentity, IdentityProvider, StaticTokens, provider_from_config,
};
pub use error::ApiError;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<dyn VehicleRegistry>,
    pub stations: Arc<dyn StationIndex>,
    pub engine: Arc<DispatchEngine>,
    pub positions: ReportedPositions,
    pub identity: Arc<dyn IdentityProvider>,
}

impl ApiState {
    /// Wire registry, index, position reports, and dispatch engine to one store.
    pub fn new(
        store: StateStore,
        dispatch: DispatchConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let positions = ReportedPositions::new();
        let engine = DispatchEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(positions.clone()),
            dispatch,
        );
        Self {
            registry: Arc::new(store.clone()),
            stations: Arc::new(store),
            engine: Arc::new(engine),
            positions,
            identity,
        }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/vehicles", get(handlers::list_vehicles).post(handlers::create_vehicle))
        .route("/vehicles/{id}", get(handlers::get_vehicle))
        .route("/vehicles/{id}/refuel", post(handlers::refuel_vehicle))
        .route("/vehicles/{id}/position", put(handlers::report_position))
        .route("/vehicles/{id}/dispatch", get(handlers::check_dispatch))
        .route("/dispatches", get(handlers::list_dispatches))
        .route("/stations", get(handlers::list_stations))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
