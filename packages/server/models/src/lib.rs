#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the floodwatch stub upstream.
//!
//! Feed payloads and the response envelope live in
//! `floodwatch_feed_models` because the gateway decodes them too; this
//! crate holds what only the server needs.

use floodwatch_feed_models::{
    CoordinateError, FALLBACK_LATITUDE, FALLBACK_LONGITUDE, GeoCoordinate,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned with every `400` for bad coordinates.
pub const INVALID_LOCATION_MESSAGE: &str = "Invalid lat or lng";

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

/// Why a location query was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationQueryError {
    #[error("Invalid lat or lng: {name} = {value:?} is not a number")]
    NotANumber { name: &'static str, value: String },

    #[error("Invalid lat or lng: {0}")]
    OutOfRange(#[from] CoordinateError),
}

/// Query string shared by the `location/*` endpoints.
///
/// Values are kept as strings so malformed numbers surface as a
/// [`LocationQueryError`] instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationQueryParams {
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Search radius in kilometres (community updates only).
    pub radius: Option<String>,
}

impl LocationQueryParams {
    /// The requested coordinate, defaulting each missing component to the
    /// fallback position.
    ///
    /// # Errors
    ///
    /// Returns [`LocationQueryError`] if a component is not a finite number
    /// or lies outside the valid range.
    pub fn coordinate(&self) -> Result<GeoCoordinate, LocationQueryError> {
        let latitude = parse_component("lat", self.lat.as_deref(), FALLBACK_LATITUDE)?;
        let longitude = parse_component("lng", self.lng.as_deref(), FALLBACK_LONGITUDE)?;
        Ok(GeoCoordinate::new(latitude, longitude)?)
    }

    /// The requested radius, if present and numeric.
    #[must_use]
    pub fn radius_km(&self) -> Option<f64> {
        self.radius
            .as_deref()
            .and_then(|r| r.trim().parse::<f64>().ok())
            .filter(|r| r.is_finite() && *r > 0.0)
    }
}

fn parse_component(
    name: &'static str,
    raw: Option<&str>,
    fallback: f64,
) -> Result<f64, LocationQueryError> {
    let Some(raw) = raw else {
        return Ok(fallback);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LocationQueryError::NotANumber {
            name,
            value: raw.to_string(),
        })
}
