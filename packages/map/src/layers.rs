//! `GeoJSON` layer data and zone hit-testing.

use floodwatch_feed_models::{FloodRiskZone, GeoCoordinate, HeatmapPoint};
use geo::{Contains, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use serde_json::json;

use crate::RiskFilter;

/// The zone's ring as a `geo` polygon in `(lng, lat)` order.
#[must_use]
pub fn zone_polygon(zone: &FloodRiskZone) -> Polygon<f64> {
    let exterior: LineString<f64> = zone
        .boundary
        .iter()
        .map(|c| (c.longitude(), c.latitude()))
        .collect();
    Polygon::new(exterior, vec![])
}

/// One polygon feature per zone, carrying `risk`, `name`, and `waterLevel`.
#[must_use]
pub fn zones_collection(zones: &[FloodRiskZone]) -> FeatureCollection {
    let features = zones
        .iter()
        .map(|zone| {
            let mut properties = JsonObject::new();
            properties.insert("risk".to_string(), json!(zone.risk_tier.to_string()));
            properties.insert("name".to_string(), json!(zone.name));
            properties.insert("waterLevel".to_string(), json!(zone.water_level));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&zone_polygon(zone)))),
                id: Some(Id::String(zone.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// One point feature per heatmap sample, weighted by `intensity`.
#[must_use]
pub fn heatmap_collection(points: &[HeatmapPoint]) -> FeatureCollection {
    let features = points
        .iter()
        .map(|p| {
            let mut properties = JsonObject::new();
            properties.insert("intensity".to_string(), json!(p.intensity));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&point(p.coordinate)))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// An empty layer.
#[must_use]
pub const fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

#[must_use]
pub fn point(at: GeoCoordinate) -> Point<f64> {
    Point::new(at.longitude(), at.latitude())
}

/// First zone passing `filter` whose interior contains `at`.
#[must_use]
pub fn zone_at(zones: &[FloodRiskZone], filter: RiskFilter, at: GeoCoordinate) -> Option<&FloodRiskZone> {
    let target = point(at);
    zones
        .iter()
        .filter(|zone| filter.matches(zone.risk_tier))
        .find(|zone| zone_polygon(zone).contains(&target))
}
