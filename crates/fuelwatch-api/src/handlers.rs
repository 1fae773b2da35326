//! REST API handlers.
//!
//! Store calls go through the `VehicleRegistry` and `StationIndex` traits;
//! dispatch checks go through the `DispatchEngine`. Errors become
//! [`ApiError`], which renders the same JSON envelope as successes.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fuelwatch_core::GeoPoint;
use fuelwatch_dispatch::{DispatchOutcome, DispatchResult};
use fuelwatch_state::{NewVehicle, VehicleId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ApiState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        })
    }

    pub fn err(message: String, code: &'static str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message),
            code: Some(code),
        })
    }
}

fn vehicle_id(path: Result<Path<VehicleId>, PathRejection>) -> Result<VehicleId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}

// ── Vehicles ───────────────────────────────────────────────────

/// GET /api/v1/vehicles
pub async fn list_vehicles(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
) -> Result<Response, ApiError> {
    let vehicles = state.registry.list_vehicles()?;
    Ok(ApiResponse::ok(vehicles).into_response())
}

/// POST /api/v1/vehicles
pub async fn create_vehicle(
    State(state): State<ApiState>,
    caller: CallerIdentity,
    body: Result<Json<NewVehicle>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let vehicle = state.registry.create_vehicle(&req)?;
    info!(
        vehicle_id = vehicle.id,
        name = %vehicle.name,
        fuel = vehicle.current_fuel,
        caller = %caller.name,
        "vehicle registered"
    );
    // A vehicle registered below the threshold is low from the start.
    state.engine.on_fuel_change(&vehicle).await;
    Ok((StatusCode::CREATED, ApiResponse::ok(vehicle)).into_response())
}

/// GET /api/v1/vehicles/{id}
pub async fn get_vehicle(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
    path: Result<Path<VehicleId>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = vehicle_id(path)?;
    let vehicle = state.registry.get_vehicle(id)?;
    Ok(ApiResponse::ok(vehicle).into_response())
}

/// Refuel request body.
#[derive(Debug, Deserialize)]
pub struct RefuelRequest {
    pub liters: f64,
}

/// POST /api/v1/vehicles/{id}/refuel
pub async fn refuel_vehicle(
    State(state): State<ApiState>,
    caller: CallerIdentity,
    path: Result<Path<VehicleId>, PathRejection>,
    body: Result<Json<RefuelRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = vehicle_id(path)?;
    let req = json_body(body)?;
    if !req.liters.is_finite() || req.liters <= 0.0 {
        return Err(ApiError::Validation(format!(
            "liters must be a positive number, got {}",
            req.liters
        )));
    }

    let vehicle = state.registry.adjust_fuel(id, req.liters)?;
    info!(
        vehicle_id = id,
        liters = req.liters,
        fuel = vehicle.current_fuel,
        caller = %caller.name,
        "vehicle refuelled"
    );
    // Lets the tracker see the vehicle back above the threshold.
    state.engine.on_fuel_change(&vehicle).await;
    Ok(ApiResponse::ok(vehicle).into_response())
}

/// PUT /api/v1/vehicles/{id}/position
pub async fn report_position(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
    path: Result<Path<VehicleId>, PathRejection>,
    body: Result<Json<GeoPoint>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = vehicle_id(path)?;
    let position = json_body(body)?;
    let vehicle = state.registry.get_vehicle(id)?;

    state.positions.report(id, position).await;
    debug!(
        vehicle_id = id,
        lon = position.longitude,
        lat = position.latitude,
        "position reported"
    );
    // Retries a low-fuel search that was waiting for a position.
    state.engine.on_fuel_change(&vehicle).await;
    Ok(ApiResponse::ok(serde_json::json!({
        "vehicle_id": id,
        "position": position,
    }))
    .into_response())
}

// ── Dispatch ───────────────────────────────────────────────────

/// Optional explicit coordinates for a dispatch check.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchQuery {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl DispatchQuery {
    fn position(&self) -> Result<Option<GeoPoint>, ApiError> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => GeoPoint::new(lon, lat)
                .map(Some)
                .map_err(|e| ApiError::Validation(e.to_string())),
            (None, None) => Ok(None),
            _ => Err(ApiError::Validation(
                "lon and lat must be given together".to_string(),
            )),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DispatchBody {
    Dispatched(DispatchResult),
    NoActionNeeded { fuel_level: f64 },
}

/// GET /api/v1/vehicles/{id}/dispatch?lon=&lat=
pub async fn check_dispatch(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
    path: Result<Path<VehicleId>, PathRejection>,
    query: Result<Query<DispatchQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let id = vehicle_id(path)?;
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let position = query.position()?;

    let body = match state.engine.check_and_dispatch(id, position).await {
        Ok(DispatchOutcome::Dispatched(result)) => DispatchBody::Dispatched(result),
        Ok(DispatchOutcome::NoActionNeeded { fuel_level }) => {
            DispatchBody::NoActionNeeded { fuel_level }
        }
        Err(e) => {
            if e.is_fault() {
                warn!(vehicle_id = id, error = %e, "dispatch check failed");
            } else {
                debug!(vehicle_id = id, outcome = %e, "dispatch check ended without result");
            }
            return Err(e.into());
        }
    };
    Ok(ApiResponse::ok(body).into_response())
}

/// GET /api/v1/dispatches
pub async fn list_dispatches(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
) -> Result<Response, ApiError> {
    Ok(ApiResponse::ok(state.engine.recent_dispatches().await).into_response())
}

// ── Stations ───────────────────────────────────────────────────

/// GET /api/v1/stations
pub async fn list_stations(
    State(state): State<ApiState>,
    _caller: CallerIdentity,
) -> Result<Response, ApiError> {
    let stations = state.stations.list_stations()?;
    Ok(ApiResponse::ok(stations).into_response())
}
