//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fuelwatch_dispatch::DispatchError;
use fuelwatch_state::{StateError, VehicleId};
use thiserror::Error;
use tracing::error;

use crate::handlers::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("no stations within {radius_meters} m")]
    NoStationsInRange { radius_meters: f64 },

    #[error("no current position for vehicle {0}")]
    PositionUnavailable(VehicleId),

    #[error("dispatch check timed out")]
    Timeout,

    /// Detail is logged, never returned to the client.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Self::NoStationsInRange { .. } => (StatusCode::NOT_FOUND, "no_stations_in_range"),
            Self::PositionUnavailable(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "position_unavailable")
            }
            Self::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound { kind, id } => Self::NotFound { kind, id },
            StateError::Validation { field, reason } => {
                Self::Validation(format!("invalid {field}: {reason}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::VehicleNotFound(id) => Self::NotFound {
                kind: "vehicle",
                id,
            },
            DispatchError::PositionUnavailable(id) => Self::PositionUnavailable(id),
            DispatchError::NoStationsInRange { radius_meters, .. } => {
                Self::NoStationsInRange { radius_meters }
            }
            DispatchError::Timeout(_) => Self::Timeout,
            DispatchError::Store(e) => Self::from(e),
            DispatchError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if let Self::Internal(detail) = &self {
            error!(%detail, "request failed");
        }
        (status, ApiResponse::<()>::err(self.to_string(), code)).into_response()
    }
}
