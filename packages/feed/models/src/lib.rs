#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feed snapshot types for the floodwatch live dashboard.
//!
//! Every payload the upstream location API returns is modelled here:
//! flood-risk zones with their heatmap and optional critical alert, the
//! weather model, and community alert updates. Snapshots are immutable and
//! always replaced wholesale; nothing in this crate patches one in place.
//!
//! Coordinates travel on the wire as `[longitude, latitude]` pairs (the
//! `GeoJSON` ordering the map layers use), and are validated on the way in.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Latitude used when no live position is available (New Delhi).
pub const FALLBACK_LATITUDE: f64 = 28.6139;
/// Longitude used when no live position is available (New Delhi).
pub const FALLBACK_LONGITUDE: f64 = 77.209;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors raised when a latitude/longitude pair violates its invariants.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// One of the components is NaN or infinite.
    #[error("coordinate is not finite: ({latitude}, {longitude})")]
    NotFinite {
        /// The rejected latitude.
        latitude: f64,
        /// The rejected longitude.
        longitude: f64,
    },

    /// Latitude outside `[-90, 90]`.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside `[-180, 180]`.
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A validated WGS84 position.
///
/// The fields are private so that every instance upholds the range
/// invariant; construct through [`GeoCoordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoCoordinate {
    latitude: f64,
    longitude: f64,
}

impl GeoCoordinate {
    /// Creates a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if either component is not finite or
    /// falls outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite {
                latitude,
                longitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// The fallback position used when the location provider has no fix.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            latitude: FALLBACK_LATITUDE,
            longitude: FALLBACK_LONGITUDE,
        }
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to `other` in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

impl TryFrom<[f64; 2]> for GeoCoordinate {
    type Error = CoordinateError;

    /// Builds a coordinate from a `[longitude, latitude]` pair.
    fn try_from([longitude, latitude]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(latitude, longitude)
    }
}

impl From<GeoCoordinate> for [f64; 2] {
    fn from(coord: GeoCoordinate) -> Self {
        [coord.longitude, coord.latitude]
    }
}

impl std::fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// A position supplied by the external location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    /// Where the user is (or is assumed to be).
    pub coordinate: GeoCoordinate,
    /// `true` for a live GPS fix, `false` for the fallback coordinate.
    pub is_live: bool,
}

impl LocationFix {
    /// A live fix at `coordinate`.
    #[must_use]
    pub const fn live(coordinate: GeoCoordinate) -> Self {
        Self {
            coordinate,
            is_live: true,
        }
    }

    /// The fixed fallback position, flagged as not live.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            coordinate: GeoCoordinate::fallback(),
            is_live: false,
        }
    }
}

/// The three independently refreshed data feeds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Feed {
    /// Flood-risk zones and sensor heatmap (fastest tier).
    FloodRisk,
    /// Weather model readings.
    Weather,
    /// Community alert updates (slowest tier).
    CommunityUpdates,
}

impl Feed {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::FloodRisk, Self::Weather, Self::CommunityUpdates]
    }

    /// Default interval between scheduled refreshes of this feed.
    #[must_use]
    pub const fn default_cadence(self) -> Duration {
        match self {
            Self::FloodRisk => Duration::from_secs(30),
            Self::Weather => Duration::from_secs(5 * 60),
            Self::CommunityUpdates => Duration::from_secs(15 * 60),
        }
    }

    /// Human-facing panel title.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FloodRisk => "Flood risk",
            Self::Weather => "Weather model",
            Self::CommunityUpdates => "Community updates",
        }
    }
}

/// Flood risk tier of a zone.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    /// Returns all variants of this enum, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::High, Self::Medium, Self::Low]
    }
}

/// A polygonal flood-risk area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodRiskZone {
    pub id: String,
    #[serde(rename = "risk")]
    pub risk_tier: RiskTier,
    pub name: String,
    /// Display string such as `"4.2m"`.
    pub water_level: String,
    /// Closed ring: at least four positions, first equal to last.
    #[serde(rename = "coordinates")]
    pub boundary: Vec<GeoCoordinate>,
}

impl FloodRiskZone {
    /// Checks that the boundary is a closed ring of at least four positions.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.boundary.len() < 4 {
            return Err(SnapshotError::TooFewVertices {
                zone_id: self.id.clone(),
                count: self.boundary.len(),
            });
        }
        if self.boundary.first() != self.boundary.last() {
            return Err(SnapshotError::OpenRing {
                zone_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// A weighted point feeding the heatmap layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    #[serde(rename = "coordinates")]
    pub coordinate: GeoCoordinate,
    /// Weight in `[0, 1]`.
    pub intensity: f64,
}

/// The single highest-priority alert shown as a dedicated map marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalAlertMarker {
    #[serde(rename = "coordinates")]
    pub coordinate: GeoCoordinate,
    pub message: String,
}

/// Structural problems found in a decoded flood-risk payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    /// A zone ring has fewer than four positions.
    #[error("zone {zone_id} has {count} boundary positions, expected at least 4")]
    TooFewVertices {
        /// Offending zone.
        zone_id: String,
        /// Number of positions found.
        count: usize,
    },

    /// A zone ring does not end where it starts.
    #[error("zone {zone_id} boundary is not a closed ring")]
    OpenRing {
        /// Offending zone.
        zone_id: String,
    },

    /// A heatmap weight outside `[0, 1]`.
    #[error("heatmap intensity {intensity} is outside [0, 1]")]
    IntensityOutOfRange {
        /// The rejected weight.
        intensity: f64,
    },
}

/// Everything the flood-risk endpoint returns for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodRiskSnapshot {
    pub zones: Vec<FloodRiskZone>,
    pub heatmap_points: Vec<HeatmapPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_alert: Option<CriticalAlertMarker>,
}

impl FloodRiskSnapshot {
    /// Validates every zone ring and heatmap weight.
    ///
    /// # Errors
    ///
    /// Returns the first [`SnapshotError`] encountered.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for zone in &self.zones {
            zone.validate()?;
        }
        if let Some(point) = self
            .heatmap_points
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.intensity))
        {
            return Err(SnapshotError::IntensityOutOfRange {
                intensity: point.intensity,
            });
        }
        Ok(())
    }
}

/// Weather model output for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Millimetres.
    pub precipitation: f64,
    /// Kilometres per hour.
    pub wind_speed: f64,
    /// Hectopascals.
    pub pressure: f64,
    pub condition: String,
}

/// Severity attached to a community alert.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Moderate,
    High,
    Severe,
}

impl AlertSeverity {
    /// Whether the alert warrants the "danger" treatment in summaries.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Severe)
    }
}

/// Lifecycle status of a community alert.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Resolved,
}

/// One alert as published to nearby users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityUpdate {
    pub id: String,
    #[serde(rename = "district")]
    pub district_name: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    /// Computed by the upstream at read time, e.g. `"5 min ago"`.
    #[serde(rename = "time")]
    pub relative_time: String,
    pub status: AlertStatus,
}

/// Body of the community-updates endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityUpdatesPayload {
    pub updates: Vec<CommunityUpdate>,
}

/// Success envelope wrapped around every upstream payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiEnvelope<T> {
    /// Wraps `data` in a successful envelope stamped with the current time.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: "Success".to_string(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Failure body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub message: String,
}

impl ApiErrorBody {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Formats how long ago `at` was, relative to `now`.
///
/// Buckets: under a minute is `"Just now"`, then whole minutes, hours, and
/// days. Timestamps in the future are treated as "just now".
#[must_use]
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        s if s < 60 => "Just now".to_string(),
        s if s < 3_600 => format!("{} min ago", s / 60),
        s if s < 86_400 => format!("{} hr ago", s / 3_600),
        s => format!("{} days ago", s / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn coord(lat: f64, lng: f64) -> GeoCoordinate {
        GeoCoordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_coordinates() {
        assert_eq!(
            GeoCoordinate::new(91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            GeoCoordinate::new(0.0, -180.5),
            Err(CoordinateError::LongitudeOutOfRange(-180.5))
        );
        assert!(matches!(
            GeoCoordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::NotFinite { .. })
        ));
        assert!(GeoCoordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn coordinates_travel_as_longitude_latitude_pairs() {
        let json = serde_json::to_value(coord(28.6139, 77.209)).unwrap();
        assert_eq!(json, serde_json::json!([77.209, 28.6139]));

        let back: GeoCoordinate = serde_json::from_value(json).unwrap();
        assert!((back.latitude() - 28.6139).abs() < 1e-9);

        let bad = serde_json::from_value::<GeoCoordinate>(serde_json::json!([200.0, 10.0]));
        assert!(bad.is_err());
    }

    #[test]
    fn coordinates_survive_json_text_exactly() {
        // derived offsets, as the upstream computes zone corners
        for i in 0..2000_u32 {
            let lat = f64::from(i).mul_add(0.0123, -45.0) - 0.4 / 111.0;
            let lng = f64::from(i).mul_add(0.0457, -90.0) + 1.8 / 111.0;
            let original = coord(lat, lng);

            let text = serde_json::to_string(&original).unwrap();
            let back: GeoCoordinate = serde_json::from_str(&text).unwrap();
            assert_eq!(back, original, "{text}");
        }
    }

    #[test]
    fn haversine_distance_between_delhi_and_mumbai() {
        let delhi = coord(28.6139, 77.209);
        let mumbai = coord(19.076, 72.8777);
        let d = delhi.distance_km(&mumbai);
        assert!((1140.0..1160.0).contains(&d), "unexpected distance {d}");
        assert!(delhi.distance_km(&delhi).abs() < 1e-9);
    }

    #[test]
    fn decodes_upstream_flood_risk_payload() {
        let body = serde_json::json!({
            "zones": [{
                "id": "zone-1",
                "risk": "high",
                "name": "North District Hub",
                "waterLevel": "4.2m",
                "coordinates": [[77.0, 28.0], [77.1, 28.0], [77.1, 28.1], [77.0, 28.1], [77.0, 28.0]]
            }],
            "heatmapPoints": [{ "coordinates": [77.209, 28.6139], "intensity": 1 }],
            "criticalAlert": { "coordinates": [77.21, 28.61], "message": "Evacuate" }
        });
        let snapshot: FloodRiskSnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snapshot.zones[0].risk_tier, RiskTier::High);
        assert_eq!(snapshot.zones[0].water_level, "4.2m");
        assert_eq!(snapshot.heatmap_points.len(), 1);
        assert!(snapshot.critical_alert.is_some());
        snapshot.validate().unwrap();
    }

    #[test]
    fn critical_alert_is_optional() {
        let body = serde_json::json!({ "zones": [], "heatmapPoints": [] });
        let snapshot: FloodRiskSnapshot = serde_json::from_value(body).unwrap();
        assert!(snapshot.critical_alert.is_none());
    }

    #[test]
    fn open_or_short_rings_fail_validation() {
        let mut zone = FloodRiskZone {
            id: "z".to_string(),
            risk_tier: RiskTier::Low,
            name: "Z".to_string(),
            water_level: "0.8m".to_string(),
            boundary: vec![coord(0.0, 0.0), coord(0.0, 1.0), coord(1.0, 1.0)],
        };
        assert!(matches!(
            zone.validate(),
            Err(SnapshotError::TooFewVertices { count: 3, .. })
        ));

        zone.boundary.push(coord(1.0, 0.0));
        assert!(matches!(zone.validate(), Err(SnapshotError::OpenRing { .. })));

        zone.boundary.push(coord(0.0, 0.0));
        assert!(zone.validate().is_ok());
    }

    #[test]
    fn heatmap_intensity_must_be_a_unit_weight() {
        let snapshot = FloodRiskSnapshot {
            zones: vec![],
            heatmap_points: vec![HeatmapPoint {
                coordinate: coord(0.0, 0.0),
                intensity: 1.5,
            }],
            critical_alert: None,
        };
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::IntensityOutOfRange { .. })
        ));
    }

    #[test]
    fn community_update_uses_upstream_field_names() {
        let body = serde_json::json!({
            "updates": [{
                "id": "a1",
                "district": "Shamli",
                "severity": "HIGH",
                "title": "Test Flood Alert",
                "message": "Sample alert for seeding",
                "time": "5 min ago",
                "status": "ACTIVE"
            }]
        });
        let payload: CommunityUpdatesPayload = serde_json::from_value(body).unwrap();
        let update = &payload.updates[0];
        assert_eq!(update.district_name, "Shamli");
        assert_eq!(update.severity, AlertSeverity::High);
        assert!(update.severity.is_urgent());
        assert_eq!(update.status, AlertStatus::Active);
        assert_eq!(update.relative_time, "5 min ago");
    }

    #[test]
    fn feed_names_and_cadences() {
        assert_eq!(Feed::FloodRisk.to_string(), "floodRisk");
        assert_eq!("communityUpdates".parse::<Feed>(), Ok(Feed::CommunityUpdates));
        assert_eq!(Feed::FloodRisk.default_cadence(), Duration::from_secs(30));
        assert_eq!(Feed::Weather.default_cadence(), Duration::from_secs(300));
        assert_eq!(
            Feed::CommunityUpdates.default_cadence(),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let ago = |secs| now - chrono::Duration::seconds(secs);
        assert_eq!(relative_time(ago(59), now), "Just now");
        assert_eq!(relative_time(ago(60), now), "1 min ago");
        assert_eq!(relative_time(ago(3_599), now), "59 min ago");
        assert_eq!(relative_time(ago(7_200), now), "2 hr ago");
        assert_eq!(relative_time(ago(3 * 86_400), now), "3 days ago");
        assert_eq!(relative_time(now + chrono::Duration::seconds(30), now), "Just now");
    }
}
