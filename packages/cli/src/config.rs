//! Watch configuration.
//!
//! The defaults ship in `config/default.toml`, embedded at compile time. An
//! override file passed with `--config` is layered on top key by key, and
//! `FLOODWATCH_API_URL` / `FLOODWATCH_REQUEST_TIMEOUT_SECS` win over both.

use std::{path::Path, time::Duration};

use floodwatch_feed_models::{CoordinateError, GeoCoordinate, LocationFix};
use floodwatch_gateway::GatewayConfig;
use floodwatch_refresh::RefreshConfig;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid config: {message}")]
    Parse { message: String },

    #[error("Invalid fallback coordinate: {0}")]
    Fallback(#[from] CoordinateError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CadenceConfig {
    pub flood_risk_secs: u64,
    pub weather_secs: u64,
    pub community_updates_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Everything `watch` and `once` need to run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub community_radius_km: f64,
    pub relocation_threshold_km: f64,
    pub cadence: CadenceConfig,
    pub fallback: FallbackConfig,
}

/// Override file shape: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
    community_radius_km: Option<f64>,
    relocation_threshold_km: Option<f64>,
    #[serde(default)]
    cadence: PartialCadence,
    fallback: Option<FallbackConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialCadence {
    flood_risk_secs: Option<u64>,
    weather_secs: Option<u64>,
    community_updates_secs: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        toml::de::from_str(DEFAULT_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }
}

impl WatchConfig {
    /// The embedded defaults, overlaid with `path` if given, then with the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the override file cannot be read or
    /// parsed, or the resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            config.merge_str(&text)?;
            log::debug!("Loaded config overrides from {}", path.display());
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn merge_str(&mut self, text: &str) -> Result<(), ConfigError> {
        let partial: PartialConfig = toml::de::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        if let Some(url) = partial.api_url {
            self.api_url = url;
        }
        if let Some(secs) = partial.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(radius) = partial.community_radius_km {
            self.community_radius_km = radius;
        }
        if let Some(threshold) = partial.relocation_threshold_km {
            self.relocation_threshold_km = threshold;
        }
        if let Some(secs) = partial.cadence.flood_risk_secs {
            self.cadence.flood_risk_secs = secs;
        }
        if let Some(secs) = partial.cadence.weather_secs {
            self.cadence.weather_secs = secs;
        }
        if let Some(secs) = partial.cadence.community_updates_secs {
            self.cadence.community_updates_secs = secs;
        }
        if let Some(fallback) = partial.fallback {
            self.fallback = fallback;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("FLOODWATCH_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = std::env::var("FLOODWATCH_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.request_timeout_secs = secs;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let cadences = [
            self.cadence.flood_risk_secs,
            self.cadence.weather_secs,
            self.cadence.community_updates_secs,
        ];
        if cadences.contains(&0) || self.request_timeout_secs == 0 {
            return Err(ConfigError::Parse {
                message: "cadences and timeout must be at least one second".to_string(),
            });
        }
        if !(self.community_radius_km.is_finite() && self.community_radius_km > 0.0) {
            return Err(ConfigError::Parse {
                message: format!(
                    "community_radius_km must be positive, got {}",
                    self.community_radius_km
                ),
            });
        }
        if !(self.relocation_threshold_km.is_finite() && self.relocation_threshold_km >= 0.0) {
            return Err(ConfigError::Parse {
                message: format!(
                    "relocation_threshold_km must not be negative, got {}",
                    self.relocation_threshold_km
                ),
            });
        }
        self.fallback_coordinate()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Fallback`] if the configured fallback is out
    /// of range.
    pub fn fallback_coordinate(&self) -> Result<GeoCoordinate, ConfigError> {
        Ok(GeoCoordinate::new(
            self.fallback.latitude,
            self.fallback.longitude,
        )?)
    }

    /// A live fix when both `lat` and `lng` are given, otherwise the
    /// configured fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Fallback`] if a coordinate is out of range.
    pub fn location(&self, lat: Option<f64>, lng: Option<f64>) -> Result<LocationFix, ConfigError> {
        Ok(match (lat, lng) {
            (Some(lat), Some(lng)) => LocationFix::live(GeoCoordinate::new(lat, lng)?),
            _ => LocationFix {
                coordinate: self.fallback_coordinate()?,
                is_live: false,
            },
        })
    }

    #[must_use]
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn refresh(&self) -> RefreshConfig {
        RefreshConfig {
            flood_risk_cadence: Duration::from_secs(self.cadence.flood_risk_secs),
            weather_cadence: Duration::from_secs(self.cadence.weather_secs),
            community_cadence: Duration::from_secs(self.cadence.community_updates_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            community_radius_km: self.community_radius_km,
            relocation_threshold_km: self.relocation_threshold_km,
        }
    }
}
