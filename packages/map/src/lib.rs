#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood-risk map synchronization.
//!
//! [`renderer::MapRenderer`] keeps a [`engine::MapEngine`] in step with the
//! latest refresh state: zone and heatmap layers, the user-position marker,
//! at most one critical-alert marker, the risk-tier filter, and the hover
//! popup. [`headless::HeadlessEngine`] is an in-memory engine whose scene can
//! be inspected or exported as `GeoJSON`.

pub mod engine;
pub mod headless;
pub mod layers;
pub mod renderer;

use floodwatch_feed_models::RiskTier;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use engine::{MapEngine, MapOptions};
pub use headless::HeadlessEngine;
pub use renderer::{MapRenderer, MapStatus};

/// Errors raised by a map engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The engine could not load. Terminal for the renderer.
    #[error("Failed to load flood risk map: {message}")]
    Init {
        /// Description of the load failure.
        message: String,
    },

    /// An operation on a loaded engine failed.
    #[error("Map engine error: {message}")]
    Engine {
        /// Description of the failed operation.
        message: String,
    },
}

/// Which zones the zone layer shows.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskFilter {
    #[default]
    All,
    High,
    Medium,
    Low,
}

impl RiskFilter {
    /// The single tier shown, or `None` for every tier.
    #[must_use]
    pub const fn tier(self) -> Option<RiskTier> {
        match self {
            Self::All => None,
            Self::High => Some(RiskTier::High),
            Self::Medium => Some(RiskTier::Medium),
            Self::Low => Some(RiskTier::Low),
        }
    }

    #[must_use]
    pub fn matches(self, tier: RiskTier) -> bool {
        self.tier().is_none_or(|shown| shown == tier)
    }

    /// Button caption for this filter.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "Show All",
            Self::High => "High only",
            Self::Medium => "Medium only",
            Self::Low => "Low only",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn filter_parses_from_lowercase() {
        assert_eq!(RiskFilter::from_str("high").unwrap(), RiskFilter::High);
        assert_eq!(RiskFilter::from_str("all").unwrap(), RiskFilter::All);
        assert!(RiskFilter::from_str("severe").is_err());
    }

    #[test]
    fn all_matches_every_tier() {
        for tier in RiskTier::all() {
            assert!(RiskFilter::All.matches(*tier));
        }
        assert!(RiskFilter::Medium.matches(RiskTier::Medium));
        assert!(!RiskFilter::Medium.matches(RiskTier::High));
    }
}
