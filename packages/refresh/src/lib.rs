#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Visibility-aware polling for the floodwatch live feeds.
//!
//! [`RefreshScheduler`] owns one timer per feed and drives fetches through a
//! [`floodwatch_gateway::FeedGateway`]. It publishes immutable
//! [`RefreshState`] values over a `tokio::sync::watch` channel; consumers
//! (map renderer, summary panels, [`Countdown`]) subscribe and never mutate.
//!
//! All timers stop while the [`VisibilityTracker`] reports the surface as
//! hidden. Becoming visible again triggers one immediate fetch per feed and
//! re-arms each timer from scratch.

pub mod countdown;
pub mod scheduler;
pub mod state;
pub mod visibility;

use std::time::Duration;

use floodwatch_feed_models::Feed;
use floodwatch_gateway::DEFAULT_COMMUNITY_RADIUS_KM;

pub use countdown::Countdown;
pub use floodwatch_gateway::config::DEFAULT_REQUEST_TIMEOUT;
pub use scheduler::RefreshScheduler;
pub use state::{FeedState, FeedStatus, RefreshState};
pub use visibility::{Visibility, VisibilitySignal, VisibilityTracker};

/// Moves shorter than this are treated as GPS jitter, in kilometres.
pub const DEFAULT_RELOCATION_THRESHOLD_KM: f64 = 0.05;

/// Cadences and limits for the [`RefreshScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    pub flood_risk_cadence: Duration,
    pub weather_cadence: Duration,
    pub community_cadence: Duration,
    /// A fetch still pending after this long settles as a timeout failure.
    pub request_timeout: Duration,
    /// Search radius passed with every community-updates request.
    pub community_radius_km: f64,
    /// Minimum distance between two fixes for the move to invalidate data.
    pub relocation_threshold_km: f64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            flood_risk_cadence: Feed::FloodRisk.default_cadence(),
            weather_cadence: Feed::Weather.default_cadence(),
            community_cadence: Feed::CommunityUpdates.default_cadence(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            community_radius_km: DEFAULT_COMMUNITY_RADIUS_KM,
            relocation_threshold_km: DEFAULT_RELOCATION_THRESHOLD_KM,
        }
    }
}

impl RefreshConfig {
    /// Interval between scheduled refreshes of `feed`.
    #[must_use]
    pub const fn cadence(&self, feed: Feed) -> Duration {
        match feed {
            Feed::FloodRisk => self.flood_risk_cadence,
            Feed::Weather => self.weather_cadence,
            Feed::CommunityUpdates => self.community_cadence,
        }
    }
}
