#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote data gateway for the floodwatch live feeds.
//!
//! Defines the [`FeedGateway`] trait the refresh scheduler polls through,
//! and [`http::HttpGateway`], its `reqwest` implementation against the
//! upstream location API. Each operation performs exactly one request and
//! never retries; retry policy belongs to the scheduler's ticks.

pub mod config;
pub mod http;

use std::time::Duration;

use floodwatch_feed_models::{
    CommunityUpdatesPayload, CoordinateError, FloodRiskSnapshot, GeoCoordinate, WeatherSnapshot,
};
use thiserror::Error;

pub use config::GatewayConfig;
pub use http::HttpGateway;

/// Default search radius for community updates, in kilometres.
pub const DEFAULT_COMMUNITY_RADIUS_KM: f64 = 50.0;

/// Why a feed fetch failed.
///
/// Carries only owned strings so a failure can be cloned into scheduler
/// state and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, reset).
    #[error("Network error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The upstream answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Numeric status code.
        status: u16,
        /// Upstream-provided message, or the canonical reason phrase.
        message: String,
    },

    /// The body was not valid JSON or did not match the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// No response arrived within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The query was rejected before any request was sent.
    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate {
        /// What was wrong with the query.
        message: String,
    },
}

impl From<CoordinateError> for GatewayError {
    fn from(e: CoordinateError) -> Self {
        Self::InvalidCoordinate {
            message: e.to_string(),
        }
    }
}

/// Typed access to the three upstream feeds.
#[async_trait::async_trait]
pub trait FeedGateway: Send + Sync {
    /// Fetches flood-risk zones, heatmap, and critical alert around `at`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the request, status, or payload is bad.
    async fn flood_risk(&self, at: GeoCoordinate) -> Result<FloodRiskSnapshot, GatewayError>;

    /// Fetches the weather model for `at`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the request, status, or payload is bad.
    async fn weather(&self, at: GeoCoordinate) -> Result<WeatherSnapshot, GatewayError>;

    /// Fetches community alert updates within `radius_km` of `at`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the request, status, or payload is bad.
    async fn community_updates(
        &self,
        at: GeoCoordinate,
        radius_km: f64,
    ) -> Result<CommunityUpdatesPayload, GatewayError>;
}
