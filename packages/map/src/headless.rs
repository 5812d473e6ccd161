//! In-memory [`MapEngine`].
//!
//! Keeps the scene the renderer has built (layers, filters, markers,
//! controls, popups, camera) plus a journal of every call, and can flatten
//! the visible scene into a single `GeoJSON` feature collection.

use std::collections::BTreeMap;

use floodwatch_feed_models::{GeoCoordinate, RiskTier};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::json;

use crate::{
    MapError,
    engine::{
        Camera, ControlId, ControlKind, LayerId, MapEngine, MapOptions, MarkerId, MarkerKind,
        MarkerSpec, PopupId, PopupSpec,
    },
    layers,
};

/// One call made against the engine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize,
    SetLayerData(LayerId),
    AddMarker(MarkerId, MarkerKind),
    MoveMarker(MarkerId),
    RemoveMarker(MarkerId),
    AddControl(ControlId, ControlKind),
    RemoveControl(ControlId),
    AddPopup(PopupId),
    RemovePopup(PopupId),
    SetFilter(LayerId, Option<RiskTier>),
    EaseTo(Camera),
    Destroy,
}

/// Everything currently on the map.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub options: Option<MapOptions>,
    pub camera: Option<Camera>,
    pub layers: BTreeMap<LayerId, FeatureCollection>,
    pub filters: BTreeMap<LayerId, RiskTier>,
    pub markers: BTreeMap<MarkerId, MarkerSpec>,
    pub controls: BTreeMap<ControlId, ControlKind>,
    pub popups: BTreeMap<PopupId, PopupSpec>,
}

impl Scene {
    /// Markers of the given kind.
    pub fn markers_of(&self, kind: MarkerKind) -> impl Iterator<Item = (&MarkerId, &MarkerSpec)> {
        self.markers.iter().filter(move |(_, spec)| spec.kind == kind)
    }

    /// The visible scene as one collection: layer features (with filters
    /// applied), then markers and popups as points tagged with `layer`.
    #[must_use]
    pub fn export(&self) -> FeatureCollection {
        let mut features = Vec::new();

        for (layer, collection) in &self.layers {
            let filter = self.filters.get(layer);
            for feature in &collection.features {
                let shown = filter.is_none_or(|tier| {
                    feature.property("risk") == Some(&json!(tier.to_string()))
                });
                if shown {
                    let mut feature = feature.clone();
                    feature.set_property("layer", layer.to_string());
                    features.push(feature);
                }
            }
        }

        for spec in self.markers.values() {
            let mut properties = JsonObject::new();
            properties.insert("layer".to_string(), json!("marker"));
            properties.insert("kind".to_string(), json!(spec.kind.to_string()));
            if let Some(popup) = &spec.popup {
                properties.insert("popup".to_string(), json!(popup));
            }
            features.push(point_feature(spec.coordinate, properties));
        }

        for popup in self.popups.values() {
            let mut properties = JsonObject::new();
            properties.insert("layer".to_string(), json!("popup"));
            properties.insert("text".to_string(), json!(popup.text));
            features.push(point_feature(popup.coordinate, properties));
        }

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn point_feature(at: GeoCoordinate, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&layers::point(at)))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Loaded,
    Destroyed,
}

/// Map engine that renders into a [`Scene`].
#[derive(Debug)]
pub struct HeadlessEngine {
    lifecycle: Lifecycle,
    init_failure: Option<String>,
    next_id: u64,
    scene: Scene,
    journal: Vec<EngineCall>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Created,
            init_failure: None,
            next_id: 0,
            scene: Scene {
                options: None,
                camera: None,
                layers: BTreeMap::new(),
                filters: BTreeMap::new(),
                markers: BTreeMap::new(),
                controls: BTreeMap::new(),
                popups: BTreeMap::new(),
            },
            journal: Vec::new(),
        }
    }

    /// An engine whose [`MapEngine::initialize`] fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            init_failure: Some(message.into()),
            ..Self::new()
        }
    }

    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn journal(&self) -> &[EngineCall] {
        &self.journal
    }

    /// Forgets the calls recorded so far.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    fn loaded(&self) -> Result<(), MapError> {
        match self.lifecycle {
            Lifecycle::Loaded => Ok(()),
            Lifecycle::Created => Err(engine_error("map is not loaded")),
            Lifecycle::Destroyed => Err(engine_error("map has been destroyed")),
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn engine_error(message: impl Into<String>) -> MapError {
    MapError::Engine {
        message: message.into(),
    }
}

#[async_trait::async_trait]
impl MapEngine for HeadlessEngine {
    async fn initialize(&mut self, options: &MapOptions) -> Result<(), MapError> {
        self.journal.push(EngineCall::Initialize);
        if self.lifecycle != Lifecycle::Created {
            return Err(MapError::Init {
                message: "map was already initialized".to_string(),
            });
        }
        if let Some(message) = &self.init_failure {
            return Err(MapError::Init {
                message: message.clone(),
            });
        }

        self.scene.options = Some(options.clone());
        self.scene.camera = Some(options.camera);
        for layer in [LayerId::Heatmap, LayerId::Zones] {
            self.scene.layers.insert(layer, layers::empty_collection());
        }
        self.lifecycle = Lifecycle::Loaded;
        Ok(())
    }

    fn set_layer_data(&mut self, layer: LayerId, data: FeatureCollection) -> Result<(), MapError> {
        self.loaded()?;
        self.journal.push(EngineCall::SetLayerData(layer));
        self.scene.layers.insert(layer, data);
        Ok(())
    }

    fn add_marker(&mut self, spec: MarkerSpec) -> Result<MarkerId, MapError> {
        self.loaded()?;
        let id = MarkerId::new(self.allocate());
        self.journal.push(EngineCall::AddMarker(id, spec.kind));
        self.scene.markers.insert(id, spec);
        Ok(id)
    }

    fn move_marker(&mut self, id: MarkerId, to: GeoCoordinate) -> Result<(), MapError> {
        self.loaded()?;
        let marker = self
            .scene
            .markers
            .get_mut(&id)
            .ok_or_else(|| engine_error(format!("unknown marker {id}")))?;
        marker.coordinate = to;
        self.journal.push(EngineCall::MoveMarker(id));
        Ok(())
    }

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError> {
        self.loaded()?;
        self.scene
            .markers
            .remove(&id)
            .ok_or_else(|| engine_error(format!("unknown marker {id}")))?;
        self.journal.push(EngineCall::RemoveMarker(id));
        Ok(())
    }

    fn add_control(&mut self, kind: ControlKind) -> Result<ControlId, MapError> {
        self.loaded()?;
        let id = ControlId::new(self.allocate());
        self.journal.push(EngineCall::AddControl(id, kind));
        self.scene.controls.insert(id, kind);
        Ok(id)
    }

    fn remove_control(&mut self, id: ControlId) -> Result<(), MapError> {
        self.loaded()?;
        self.scene
            .controls
            .remove(&id)
            .ok_or_else(|| engine_error(format!("unknown control {id}")))?;
        self.journal.push(EngineCall::RemoveControl(id));
        Ok(())
    }

    fn add_popup(&mut self, spec: PopupSpec) -> Result<PopupId, MapError> {
        self.loaded()?;
        let id = PopupId::new(self.allocate());
        self.journal.push(EngineCall::AddPopup(id));
        self.scene.popups.insert(id, spec);
        Ok(id)
    }

    fn remove_popup(&mut self, id: PopupId) -> Result<(), MapError> {
        self.loaded()?;
        self.scene
            .popups
            .remove(&id)
            .ok_or_else(|| engine_error(format!("unknown popup {id}")))?;
        self.journal.push(EngineCall::RemovePopup(id));
        Ok(())
    }

    fn set_filter(&mut self, layer: LayerId, tier: Option<RiskTier>) -> Result<(), MapError> {
        self.loaded()?;
        if !self.scene.layers.contains_key(&layer) {
            return Err(engine_error(format!("unknown layer {layer}")));
        }
        self.journal.push(EngineCall::SetFilter(layer, tier));
        match tier {
            Some(tier) => self.scene.filters.insert(layer, tier),
            None => self.scene.filters.remove(&layer),
        };
        Ok(())
    }

    fn ease_to(&mut self, camera: Camera) -> Result<(), MapError> {
        self.loaded()?;
        self.journal.push(EngineCall::EaseTo(camera));
        self.scene.camera = Some(camera);
        Ok(())
    }

    fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.journal.push(EngineCall::Destroy);
        self.lifecycle = Lifecycle::Destroyed;
        self.scene = Scene::default();
    }
}

#[cfg(test)]
mod tests {
    use floodwatch_location::flood_risk_for;

    use super::*;

    fn delhi() -> GeoCoordinate {
        GeoCoordinate::new(28.6139, 77.209).unwrap()
    }

    #[tokio::test]
    async fn operations_require_a_loaded_map() {
        let mut engine = HeadlessEngine::new();
        assert!(engine.add_control(ControlKind::Navigation).is_err());

        engine
            .initialize(&MapOptions::centered_on(delhi()))
            .await
            .unwrap();
        assert!(engine.add_control(ControlKind::Navigation).is_ok());

        engine.destroy();
        engine.destroy();
        assert!(engine.is_destroyed());
        assert!(engine.add_control(ControlKind::Navigation).is_err());
        assert_eq!(
            engine
                .journal()
                .iter()
                .filter(|c| **c == EngineCall::Destroy)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failing_engine_reports_init_error() {
        let mut engine = HeadlessEngine::failing("WebGL unavailable");
        let err = engine
            .initialize(&MapOptions::centered_on(delhi()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MapError::Init {
                message: "WebGL unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unknown_handles_are_rejected() {
        let mut engine = HeadlessEngine::new();
        engine
            .initialize(&MapOptions::centered_on(delhi()))
            .await
            .unwrap();
        assert!(engine.remove_marker(MarkerId::new(42)).is_err());
        assert!(engine.move_marker(MarkerId::new(42), delhi()).is_err());
        assert!(engine.remove_popup(PopupId::new(7)).is_err());
    }

    #[tokio::test]
    async fn export_applies_layer_filters() {
        let mut engine = HeadlessEngine::new();
        engine
            .initialize(&MapOptions::centered_on(delhi()))
            .await
            .unwrap();
        let snapshot = flood_risk_for(delhi());
        engine
            .set_layer_data(LayerId::Zones, layers::zones_collection(&snapshot.zones))
            .unwrap();
        engine
            .set_filter(LayerId::Zones, Some(RiskTier::Medium))
            .unwrap();
        engine
            .add_marker(MarkerSpec {
                coordinate: delhi(),
                kind: MarkerKind::UserLive,
                popup: None,
            })
            .unwrap();

        let exported = engine.scene().export();
        let zones: Vec<_> = exported
            .features
            .iter()
            .filter(|f| f.property("layer") == Some(&json!("flood-zones-fill")))
            .collect();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].property("name"), Some(&json!("Eastern Corridor")));
        assert!(
            exported
                .features
                .iter()
                .any(|f| f.property("kind") == Some(&json!("user-live")))
        );
    }
}
