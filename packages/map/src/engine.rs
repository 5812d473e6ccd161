//! Capabilities the renderer needs from a map engine.

use floodwatch_feed_models::{GeoCoordinate, RiskTier};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::MapError;

/// Zoom the camera eases to once the map is ready.
pub const READY_ZOOM: f64 = 12.0;
/// Pitch the camera eases to once the map is ready.
pub const READY_PITCH: f64 = 65.0;
/// Bearing the camera eases to once the map is ready.
pub const READY_BEARING: f64 = -15.0;

/// Dark raster basemap tiles.
pub const DARK_BASEMAP_TILES: &str = "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png";

macro_rules! handle_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle_id!(MarkerId);
handle_id!(ControlId);
handle_id!(PopupId);

/// Data layers the engine renders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
pub enum LayerId {
    /// Filled risk-zone polygons.
    #[strum(serialize = "flood-zones-fill")]
    #[serde(rename = "flood-zones-fill")]
    Zones,
    /// Sensor intensity heatmap.
    #[strum(serialize = "heatmap")]
    #[serde(rename = "heatmap")]
    Heatmap,
}

/// Visual style of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MarkerKind {
    /// User position from a live GPS fix (pulsing green).
    UserLive,
    /// User position from the fallback coordinate (amber).
    UserFallback,
    /// Critical flood alert (pulsing red).
    CriticalAlert,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub coordinate: GeoCoordinate,
    pub kind: MarkerKind,
    /// Text shown when the marker is clicked.
    pub popup: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum ControlKind {
    /// Zoom and compass buttons, top right.
    Navigation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupSpec {
    pub coordinate: GeoCoordinate,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: GeoCoordinate,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Camera {
    /// The tilted overview the map settles into once loaded.
    #[must_use]
    pub const fn overview(center: GeoCoordinate) -> Self {
        Self {
            center,
            zoom: READY_ZOOM,
            pitch: READY_PITCH,
            bearing: READY_BEARING,
        }
    }
}

/// How the engine is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOptions {
    /// Flat, slightly zoomed-out starting view.
    pub camera: Camera,
    pub basemap_tiles: String,
}

impl MapOptions {
    #[must_use]
    pub fn centered_on(center: GeoCoordinate) -> Self {
        Self {
            camera: Camera {
                center,
                zoom: READY_ZOOM - 1.0,
                pitch: 0.0,
                bearing: 0.0,
            },
            basemap_tiles: DARK_BASEMAP_TILES.to_string(),
        }
    }
}

/// A map the renderer can drive.
///
/// Every method except [`MapEngine::initialize`] may only be called after
/// `initialize` has returned `Ok`, and none after [`MapEngine::destroy`].
#[async_trait::async_trait]
pub trait MapEngine: Send {
    /// Loads the map. Completion is the "ready" signal.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Init`] if the map cannot be loaded.
    async fn initialize(&mut self, options: &MapOptions) -> Result<(), MapError>;

    /// Replaces the contents of `layer`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects the data.
    fn set_layer_data(&mut self, layer: LayerId, data: FeatureCollection) -> Result<(), MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the marker cannot be placed.
    fn add_marker(&mut self, spec: MarkerSpec) -> Result<MarkerId, MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if `id` is unknown.
    fn move_marker(&mut self, id: MarkerId, to: GeoCoordinate) -> Result<(), MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if `id` is unknown.
    fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the control cannot be added.
    fn add_control(&mut self, kind: ControlKind) -> Result<ControlId, MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if `id` is unknown.
    fn remove_control(&mut self, id: ControlId) -> Result<(), MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the popup cannot be shown.
    fn add_popup(&mut self, spec: PopupSpec) -> Result<PopupId, MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if `id` is unknown.
    fn remove_popup(&mut self, id: PopupId) -> Result<(), MapError>;

    /// Restricts `layer` to features of `tier`, or clears the filter.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the layer does not exist.
    fn set_filter(&mut self, layer: LayerId, tier: Option<RiskTier>) -> Result<(), MapError>;

    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the camera cannot move.
    fn ease_to(&mut self, camera: Camera) -> Result<(), MapError>;

    /// Releases the map instance. Idempotent.
    fn destroy(&mut self);
}
