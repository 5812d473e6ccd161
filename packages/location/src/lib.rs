#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location-based payloads served by the floodwatch upstream.
//!
//! There is no live flood model behind this crate. Flood-risk zones, the
//! heatmap, and the weather model are derived deterministically from the
//! requested coordinate, so the same position always yields the same
//! snapshot. Community updates come from the [`alerts`] board, whose
//! relative times are computed at read time.

pub mod alerts;

use floodwatch_feed_models::{
    CriticalAlertMarker, FloodRiskSnapshot, FloodRiskZone, GeoCoordinate, HeatmapPoint, RiskTier,
    WeatherSnapshot,
};

/// Roughly one degree of latitude, in kilometres.
const KM_PER_DEGREE: f64 = 111.0;

/// Offsets one coordinate component by `km`, pushing away from zero for
/// positive offsets.
fn offset(component: f64, km: f64) -> f64 {
    let direction = if component >= 0.0 { 1.0 } else { -1.0 };
    component + (km / KM_PER_DEGREE) * direction
}

/// Shifts `origin` by the given kilometre offsets, clamping at the poles
/// and the antimeridian.
fn shifted(origin: GeoCoordinate, east_km: f64, north_km: f64) -> GeoCoordinate {
    let latitude = offset(origin.latitude(), north_km).clamp(-90.0, 90.0);
    let longitude = offset(origin.longitude(), east_km).clamp(-180.0, 180.0);
    GeoCoordinate::new(latitude, longitude).unwrap_or(origin)
}

/// Closed rectangular ring spanning the given kilometre offsets.
fn rectangle(
    origin: GeoCoordinate,
    (west, east): (f64, f64),
    (south, north): (f64, f64),
) -> Vec<GeoCoordinate> {
    vec![
        shifted(origin, west, south),
        shifted(origin, east, south),
        shifted(origin, east, north),
        shifted(origin, west, north),
        shifted(origin, west, south),
    ]
}

/// Flood-risk zones, heatmap, and critical alert centred on `origin`.
#[must_use]
pub fn flood_risk_for(origin: GeoCoordinate) -> FloodRiskSnapshot {
    let zones = vec![
        FloodRiskZone {
            id: "zone-1".to_string(),
            risk_tier: RiskTier::High,
            name: "North District Hub".to_string(),
            water_level: "4.2m".to_string(),
            boundary: rectangle(origin, (-1.5, 0.5), (-0.7, 0.3)),
        },
        FloodRiskZone {
            id: "zone-2".to_string(),
            risk_tier: RiskTier::Medium,
            name: "Eastern Corridor".to_string(),
            water_level: "2.1m".to_string(),
            boundary: rectangle(origin, (0.6, 1.8), (-0.4, 0.5)),
        },
        FloodRiskZone {
            id: "zone-3".to_string(),
            risk_tier: RiskTier::Low,
            name: "South Safe Zone".to_string(),
            water_level: "0.8m".to_string(),
            boundary: rectangle(origin, (-1.2, -0.2), (-2.0, -1.2)),
        },
    ];

    let heatmap_points = [
        (shifted(origin, -0.7, -0.2), 0.9),
        (origin, 1.0),
        (shifted(origin, 0.2, -0.4), 0.85),
        (shifted(origin, 0.8, 0.2), 0.6),
        (shifted(origin, -0.9, -1.0), 0.3),
    ]
    .into_iter()
    .map(|(coordinate, intensity)| HeatmapPoint {
        coordinate,
        intensity,
    })
    .collect();

    FloodRiskSnapshot {
        zones,
        heatmap_points,
        critical_alert: Some(CriticalAlertMarker {
            coordinate: shifted(origin, 0.1, -0.3),
            message: "Flood Zone Alpha · 4.2m · Evacuate".to_string(),
        }),
    }
}

/// Weather model readings for `at`.
///
/// A single seed in `[0, 1]` is derived from the position and scales every
/// reading, so nearby requests agree and repeated requests are identical.
#[must_use]
pub fn weather_for(at: GeoCoordinate) -> WeatherSnapshot {
    let seed = (at.latitude() * 7.0 + at.longitude() * 13.0)
        .sin()
        .mul_add(0.5, 0.5);

    let condition = if seed > 0.7 {
        "Heavy rain"
    } else if seed > 0.4 {
        "Light rain"
    } else {
        "Partly cloudy"
    };

    WeatherSnapshot {
        temperature: seed.mul_add(12.0, 18.0).round(),
        humidity: seed.mul_add(25.0, 65.0).round(),
        precipitation: (seed * 25.0).round(),
        wind_speed: seed.mul_add(12.0, 8.0).round(),
        pressure: seed.mul_add(15.0, 1008.0).round(),
        condition: condition.to_string(),
    }
}
