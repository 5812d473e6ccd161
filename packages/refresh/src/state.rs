//! Published refresh state.
//!
//! Every value sent on the scheduler's watch channel is a complete
//! [`RefreshState`]. Payloads sit behind `Arc` so cloning a state for a
//! subscriber never copies feed data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use floodwatch_feed_models::{
    CommunityUpdatesPayload, Feed, FloodRiskSnapshot, LocationFix, WeatherSnapshot,
};
use tokio::time::Instant;

/// Lifecycle of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Never fetched, or invalidated by a relocation.
    Idle,
    /// A request is outstanding.
    Fetching,
    /// The last request succeeded.
    Ready,
    /// The last request failed; any previous data is still present.
    Failed,
}

/// Last known value and fetch status of one feed.
#[derive(Debug, Clone)]
pub struct FeedState<T> {
    /// Most recent successfully fetched payload.
    pub data: Option<Arc<T>>,
    /// Wall-clock time `data` was accepted.
    pub last_updated: Option<DateTime<Utc>>,
    /// Monotonic twin of `last_updated`, used for countdowns.
    pub refreshed_at: Option<Instant>,
    /// `true` while a request for this feed is outstanding.
    pub loading: bool,
    /// Message of the most recent failure, cleared on the next success.
    pub error: Option<String>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_updated: None,
            refreshed_at: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> FeedState<T> {
    #[must_use]
    pub const fn status(&self) -> FeedStatus {
        if self.loading {
            FeedStatus::Fetching
        } else if self.error.is_some() {
            FeedStatus::Failed
        } else if self.data.is_some() {
            FeedStatus::Ready
        } else {
            FeedStatus::Idle
        }
    }

    /// Data is being shown even though the latest fetch failed.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.error.is_some() && self.data.is_some()
    }

    fn accept(&mut self, data: T, at: DateTime<Utc>, now: Instant) {
        self.data = Some(Arc::new(data));
        self.last_updated = Some(at);
        self.refreshed_at = Some(now);
        self.loading = false;
        self.error = None;
    }

    fn reject(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }

    fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// A successful fetch of any feed.
#[derive(Debug, Clone)]
pub enum FeedData {
    FloodRisk(FloodRiskSnapshot),
    Weather(WeatherSnapshot),
    CommunityUpdates(CommunityUpdatesPayload),
}

impl FeedData {
    #[must_use]
    pub const fn feed(&self) -> Feed {
        match self {
            Self::FloodRisk(_) => Feed::FloodRisk,
            Self::Weather(_) => Feed::Weather,
            Self::CommunityUpdates(_) => Feed::CommunityUpdates,
        }
    }
}

/// Uniform view of one feed's metadata, independent of its payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedMeta<'a> {
    pub status: FeedStatus,
    pub loading: bool,
    pub has_data: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub error: Option<&'a str>,
}

impl<T> FeedState<T> {
    fn meta(&self) -> FeedMeta<'_> {
        FeedMeta {
            status: self.status(),
            loading: self.loading,
            has_data: self.data.is_some(),
            last_updated: self.last_updated,
            error: self.error.as_deref(),
        }
    }
}

/// Everything the scheduler knows, as of one instant.
#[derive(Debug, Clone)]
pub struct RefreshState {
    pub location: LocationFix,
    pub visible: bool,
    pub flood_risk: FeedState<FloodRiskSnapshot>,
    pub weather: FeedState<WeatherSnapshot>,
    pub community_updates: FeedState<CommunityUpdatesPayload>,
}

impl RefreshState {
    #[must_use]
    pub fn new(location: LocationFix, visible: bool) -> Self {
        Self {
            location,
            visible,
            flood_risk: FeedState::default(),
            weather: FeedState::default(),
            community_updates: FeedState::default(),
        }
    }

    #[must_use]
    pub fn meta(&self, feed: Feed) -> FeedMeta<'_> {
        match feed {
            Feed::FloodRisk => self.flood_risk.meta(),
            Feed::Weather => self.weather.meta(),
            Feed::CommunityUpdates => self.community_updates.meta(),
        }
    }

    #[must_use]
    pub fn is_loading(&self, feed: Feed) -> bool {
        self.meta(feed).loading
    }

    /// `true` while any feed has a request outstanding.
    #[must_use]
    pub fn any_loading(&self) -> bool {
        Feed::all().iter().any(|feed| self.is_loading(*feed))
    }

    pub(crate) fn set_loading(&mut self, feed: Feed, loading: bool) {
        match feed {
            Feed::FloodRisk => self.flood_risk.loading = loading,
            Feed::Weather => self.weather.loading = loading,
            Feed::CommunityUpdates => self.community_updates.loading = loading,
        }
    }

    pub(crate) fn accept(&mut self, data: FeedData, at: DateTime<Utc>, now: Instant) {
        match data {
            FeedData::FloodRisk(d) => self.flood_risk.accept(d, at, now),
            FeedData::Weather(d) => self.weather.accept(d, at, now),
            FeedData::CommunityUpdates(d) => self.community_updates.accept(d, at, now),
        }
    }

    pub(crate) fn reject(&mut self, feed: Feed, message: String) {
        match feed {
            Feed::FloodRisk => self.flood_risk.reject(message),
            Feed::Weather => self.weather.reject(message),
            Feed::CommunityUpdates => self.community_updates.reject(message),
        }
    }

    /// Drops every payload; used when the location moves materially.
    pub(crate) fn invalidate_all(&mut self) {
        self.flood_risk.invalidate();
        self.weather.invalidate();
        self.community_updates.invalidate();
    }
}
