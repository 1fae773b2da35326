//! fuelwatch.toml configuration and `FUELWATCH_*` environment overrides.
//!
//! Every key is optional. Resolution order is defaults, then the TOML file,
//! then the environment. Environment lookup is injected so callers (and
//! tests) decide where values come from.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ENV_DECAY_INTERVAL: &str = "FUELWATCH_DECAY_INTERVAL";
pub const ENV_DECAY_STEP: &str = "FUELWATCH_DECAY_STEP";
pub const ENV_LOW_FUEL_THRESHOLD: &str = "FUELWATCH_LOW_FUEL_THRESHOLD";
pub const ENV_SEARCH_RADIUS: &str = "FUELWATCH_SEARCH_RADIUS_METERS";
pub const ENV_MAX_CANDIDATES: &str = "FUELWATCH_MAX_CANDIDATES";
pub const ENV_DISPATCH_TIMEOUT: &str = "FUELWATCH_DISPATCH_TIMEOUT";

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Raw file layout. Mirrors the resolved config with every key optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub decay: Option<DecayFile>,
    pub dispatch: Option<DispatchFile>,
    pub auth: Option<AuthFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayFile {
    pub interval: Option<String>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchFile {
    pub low_fuel_threshold: Option<f64>,
    pub search_radius_meters: Option<f64>,
    pub max_candidates: Option<usize>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthFile {
    /// Bearer token → caller name.
    pub tokens: Option<HashMap<String, String>>,
}

/// Fuel decay settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayConfig {
    pub interval: Duration,
    /// Liters removed from each vehicle per tick.
    pub step: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            step: 1.0,
        }
    }
}

/// Threshold detection and nearest-station search settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub low_fuel_threshold: f64,
    pub search_radius_meters: f64,
    pub max_candidates: usize,
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            low_fuel_threshold: 20.0,
            search_radius_meters: 5000.0,
            max_candidates: 3,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Static bearer tokens. Empty means anonymous access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthConfig {
    pub tokens: HashMap<String, String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuelwatchConfig {
    pub decay: DecayConfig,
    pub dispatch: DispatchConfig,
    pub auth: AuthConfig,
}

impl FuelwatchConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                debug!(?path, "config file read");
                toml::from_str(&content)?
            }
            None => ConfigFile::default(),
        };
        Self::resolve(file, env)
    }

    /// Merge a parsed file with defaults and environment overrides.
    pub fn resolve<F>(file: ConfigFile, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = FuelwatchConfig::default();

        if let Some(decay) = file.decay {
            if let Some(interval) = decay.interval {
                config.decay.interval = duration_value("decay.interval", &interval)?;
            }
            if let Some(step) = decay.step {
                config.decay.step = step;
            }
        }
        if let Some(dispatch) = file.dispatch {
            if let Some(v) = dispatch.low_fuel_threshold {
                config.dispatch.low_fuel_threshold = v;
            }
            if let Some(v) = dispatch.search_radius_meters {
                config.dispatch.search_radius_meters = v;
            }
            if let Some(v) = dispatch.max_candidates {
                config.dispatch.max_candidates = v;
            }
            if let Some(v) = dispatch.timeout {
                config.dispatch.timeout = duration_value("dispatch.timeout", &v)?;
            }
        }
        if let Some(tokens) = file.auth.and_then(|a| a.tokens) {
            config.auth.tokens = tokens;
        }

        if let Some(v) = env(ENV_DECAY_INTERVAL) {
            config.decay.interval = duration_value(ENV_DECAY_INTERVAL, &v)?;
        }
        if let Some(v) = env(ENV_DECAY_STEP) {
            config.decay.step = parse_value(ENV_DECAY_STEP, &v)?;
        }
        if let Some(v) = env(ENV_LOW_FUEL_THRESHOLD) {
            config.dispatch.low_fuel_threshold = parse_value(ENV_LOW_FUEL_THRESHOLD, &v)?;
        }
        if let Some(v) = env(ENV_SEARCH_RADIUS) {
            config.dispatch.search_radius_meters = parse_value(ENV_SEARCH_RADIUS, &v)?;
        }
        if let Some(v) = env(ENV_MAX_CANDIDATES) {
            config.dispatch.max_candidates = parse_value(ENV_MAX_CANDIDATES, &v)?;
        }
        if let Some(v) = env(ENV_DISPATCH_TIMEOUT) {
            config.dispatch.timeout = duration_value(ENV_DISPATCH_TIMEOUT, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, value: String| ConfigError::Invalid { key, value };

        if self.decay.interval.is_zero() {
            return Err(invalid("decay.interval", "0".to_string()));
        }
        if !non_negative(self.decay.step) {
            return Err(invalid("decay.step", self.decay.step.to_string()));
        }
        let d = &self.dispatch;
        if !non_negative(d.low_fuel_threshold) {
            return Err(invalid(
                "dispatch.low_fuel_threshold",
                d.low_fuel_threshold.to_string(),
            ));
        }
        if !non_negative(d.search_radius_meters) {
            return Err(invalid(
                "dispatch.search_radius_meters",
                d.search_radius_meters.to_string(),
            ));
        }
        if d.max_candidates == 0 {
            return Err(invalid("dispatch.max_candidates", "0".to_string()));
        }
        if d.timeout.is_zero() {
            return Err(invalid("dispatch.timeout", "0".to_string()));
        }
        Ok(())
    }
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn duration_value(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    parse_duration(raw).ok_or_else(|| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

/// Parse a duration string like "3s", "500ms", "2m", or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
