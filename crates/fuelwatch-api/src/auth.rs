//! Caller identification from `Authorization: Bearer <token>`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use fuelwatch_core::AuthConfig;
use thiserror::Error;
use tracing::debug;

use crate::ApiState;
use crate::error::ApiError;

/// The authenticated caller of an `/api/v1` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no bearer token presented")]
    MissingCredentials,

    #[error("unknown bearer token")]
    UnknownToken,
}

/// Resolves a bearer token (if any) to a caller.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, AuthFailure>;
}

/// Fixed token table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    /// token → caller name
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl IdentityProvider for StaticTokens {
    fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, AuthFailure> {
        let token = bearer.ok_or(AuthFailure::MissingCredentials)?;
        let name = self.tokens.get(token).ok_or(AuthFailure::UnknownToken)?;
        Ok(CallerIdentity { name: name.clone() })
    }
}

/// Accepts every request. Used when no tokens are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn authenticate(&self, _bearer: Option<&str>) -> Result<CallerIdentity, AuthFailure> {
        Ok(CallerIdentity {
            name: "anonymous".to_string(),
        })
    }
}

/// `StaticTokens` if any tokens are configured, otherwise `Anonymous`.
pub fn provider_from_config(config: &AuthConfig) -> Arc<dyn IdentityProvider> {
    if config.tokens.is_empty() {
        Arc::new(Anonymous)
    } else {
        Arc::new(StaticTokens::new(config.tokens.clone()))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parse_bearer(parts.headers.get(AUTHORIZATION)?.to_str().ok()?)
}

/// Token from a `Bearer <token>` credential. The scheme is case-insensitive.
fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<ApiState> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        state
            .identity
            .authenticate(bearer_token(parts))
            .map_err(|reason| {
                debug!(path = %parts.uri.path(), %reason, "request rejected");
                ApiError::Unauthorized
            })
    }
}
