//! Keeps a map engine in step with refresh state.
//!
//! Callers describe what the map should show; the renderer works out the
//! engine calls. Before the engine is ready only the desired state is
//! recorded, and it is applied in full once [`MapRenderer::mount`]
//! succeeds.

use std::sync::Arc;

use floodwatch_feed_models::{
    CriticalAlertMarker, FloodRiskSnapshot, FloodRiskZone, GeoCoordinate, LocationFix,
};
use floodwatch_refresh::RefreshState;
use strum_macros::{AsRefStr, Display};

use crate::{
    MapError, RiskFilter,
    engine::{
        Camera, ControlId, ControlKind, LayerId, MapEngine, MapOptions, MarkerId, MarkerKind,
        MarkerSpec, PopupId, PopupSpec,
    },
    layers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MapStatus {
    Loading,
    Ready,
    /// The engine failed to load. Never retried.
    Error,
}

#[derive(Debug, Default)]
struct Mounted {
    navigation: Option<ControlId>,
    user_marker: Option<(MarkerId, MarkerKind)>,
    critical_marker: Option<(MarkerId, CriticalAlertMarker)>,
    hover_popup: Option<PopupId>,
    flood_risk: Option<Arc<FloodRiskSnapshot>>,
    layers_loaded: bool,
}

/// Synchronizes one engine instance with the latest refresh state.
#[derive(Debug)]
pub struct MapRenderer<E: MapEngine> {
    engine: E,
    options: MapOptions,
    status: MapStatus,
    error: Option<MapError>,
    torn_down: bool,
    user: LocationFix,
    flood_risk: Option<Arc<FloodRiskSnapshot>>,
    filter: RiskFilter,
    mounted: Mounted,
}

impl<E: MapEngine> MapRenderer<E> {
    /// A renderer centred on `user`'s position. Nothing reaches the engine
    /// until [`Self::mount`].
    pub fn new(engine: E, user: LocationFix) -> Self {
        Self {
            engine,
            options: MapOptions::centered_on(user.coordinate),
            status: MapStatus::Loading,
            error: None,
            torn_down: false,
            user,
            flood_risk: None,
            filter: RiskFilter::default(),
            mounted: Mounted::default(),
        }
    }

    /// Loads the engine and applies everything recorded so far.
    ///
    /// A load failure moves the renderer to [`MapStatus::Error`] for good;
    /// later calls to `mount` return that status without retrying.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine loads but rejects one of
    /// the initial operations.
    pub async fn mount(&mut self) -> Result<MapStatus, MapError> {
        if self.status != MapStatus::Loading || self.torn_down {
            return Ok(self.status);
        }

        if let Err(e) = self.engine.initialize(&self.options).await {
            log::error!("{e}");
            self.status = MapStatus::Error;
            self.error = Some(e);
            return Ok(self.status);
        }

        self.status = MapStatus::Ready;
        log::debug!("Map ready at {}", self.options.camera.center);

        self.mounted.navigation = Some(self.engine.add_control(ControlKind::Navigation)?);
        self.engine
            .ease_to(Camera::overview(self.options.camera.center))?;
        self.sync_user_marker()?;
        self.sync_flood_risk()?;
        self.sync_filter()?;

        Ok(self.status)
    }

    #[must_use]
    pub const fn status(&self) -> MapStatus {
        self.status
    }

    /// The load failure, when [`Self::status`] is [`MapStatus::Error`].
    #[must_use]
    pub const fn error(&self) -> Option<&MapError> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub const fn filter(&self) -> RiskFilter {
        self.filter
    }

    const fn is_ready(&self) -> bool {
        matches!(self.status, MapStatus::Ready) && !self.torn_down
    }

    /// Applies the flood-risk data and location from a scheduler snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects an update.
    pub fn apply(&mut self, state: &RefreshState) -> Result<(), MapError> {
        self.set_user_location(state.location)?;
        self.set_flood_risk(state.flood_risk.data.clone())
    }

    /// Replaces the zone and heatmap layers and reconciles the critical
    /// alert marker. `None` empties both layers.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects an update.
    pub fn set_flood_risk(
        &mut self,
        snapshot: Option<Arc<FloodRiskSnapshot>>,
    ) -> Result<(), MapError> {
        self.flood_risk = snapshot;
        if self.is_ready() {
            self.sync_flood_risk()?;
        }
        Ok(())
    }

    /// Moves the user marker, restyling it if the fix changed between live
    /// and fallback.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects an update.
    pub fn set_user_location(&mut self, fix: LocationFix) -> Result<(), MapError> {
        self.user = fix;
        if self.is_ready() {
            self.sync_user_marker()?;
        }
        Ok(())
    }

    /// Restricts the zone layer to one tier. Purely local; never fetches.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects the filter.
    pub fn set_filter(&mut self, filter: RiskFilter) -> Result<(), MapError> {
        self.filter = filter;
        if self.is_ready() {
            self.sync_filter()?;
            self.clear_hover()?;
        }
        Ok(())
    }

    /// Shows the hover popup for the visible zone under `at`, or hides it
    /// when `at` is `None` or outside every visible zone. Returns the
    /// hovered zone.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects the popup.
    pub fn hover(&mut self, at: Option<GeoCoordinate>) -> Result<Option<FloodRiskZone>, MapError> {
        if !self.is_ready() {
            return Ok(None);
        }
        self.clear_hover()?;

        let zone = match (at, &self.flood_risk) {
            (Some(at), Some(snapshot)) => {
                layers::zone_at(&snapshot.zones, self.filter, at).map(|zone| (at, zone.clone()))
            }
            _ => None,
        };
        let Some((at, zone)) = zone else {
            return Ok(None);
        };

        let text = format!(
            "{}\nRisk: {} · Water: {}",
            zone.name,
            capitalize(zone.risk_tier.as_ref()),
            zone.water_level
        );
        self.mounted.hover_popup = Some(self.engine.add_popup(PopupSpec { coordinate: at, text })?);
        Ok(Some(zone))
    }

    /// Releases the popup, markers, and controls, then the engine itself.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let mounted = std::mem::take(&mut self.mounted);
        if let Some(id) = mounted.hover_popup {
            log_failure(self.engine.remove_popup(id));
        }
        if let Some((id, _)) = mounted.user_marker {
            log_failure(self.engine.remove_marker(id));
        }
        if let Some((id, _)) = mounted.critical_marker {
            log_failure(self.engine.remove_marker(id));
        }
        if let Some(id) = mounted.navigation {
            log_failure(self.engine.remove_control(id));
        }
        self.engine.destroy();
        log::debug!("Map torn down");
    }

    fn sync_user_marker(&mut self) -> Result<(), MapError> {
        let kind = if self.user.is_live {
            MarkerKind::UserLive
        } else {
            MarkerKind::UserFallback
        };

        match self.mounted.user_marker {
            Some((id, current)) if current == kind => {
                self.engine.move_marker(id, self.user.coordinate)?;
            }
            existing => {
                if let Some((id, _)) = existing {
                    self.engine.remove_marker(id)?;
                    self.mounted.user_marker = None;
                }
                let popup = if self.user.is_live {
                    "You · Live GPS"
                } else {
                    "Default center · Enable GPS for live location"
                };
                let id = self.engine.add_marker(MarkerSpec {
                    coordinate: self.user.coordinate,
                    kind,
                    popup: Some(popup.to_string()),
                })?;
                self.mounted.user_marker = Some((id, kind));
            }
        }
        Ok(())
    }

    fn sync_flood_risk(&mut self) -> Result<(), MapError> {
        let unchanged = match (&self.mounted.flood_risk, &self.flood_risk) {
            (Some(applied), Some(desired)) => Arc::ptr_eq(applied, desired),
            (None, None) => self.mounted.layers_loaded,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        let (zones, heatmap) = self.flood_risk.as_deref().map_or_else(
            || (layers::empty_collection(), layers::empty_collection()),
            |snapshot| {
                (
                    layers::zones_collection(&snapshot.zones),
                    layers::heatmap_collection(&snapshot.heatmap_points),
                )
            },
        );
        self.engine.set_layer_data(LayerId::Zones, zones)?;
        self.engine.set_layer_data(LayerId::Heatmap, heatmap)?;
        self.mounted.flood_risk.clone_from(&self.flood_risk);
        self.mounted.layers_loaded = true;

        let desired = self
            .flood_risk
            .as_ref()
            .and_then(|snapshot| snapshot.critical_alert.clone());
        self.sync_critical_marker(desired)?;
        self.clear_hover()
    }

    /// Keeps zero or one critical marker matching `desired`. A marker whose
    /// coordinate or message changed is replaced rather than mutated.
    fn sync_critical_marker(&mut self, desired: Option<CriticalAlertMarker>) -> Result<(), MapError> {
        if self.mounted.critical_marker.as_ref().map(|(_, alert)| alert) == desired.as_ref() {
            return Ok(());
        }

        if let Some((id, _)) = self.mounted.critical_marker {
            self.engine.remove_marker(id)?;
            self.mounted.critical_marker = None;
        }
        if let Some(alert) = desired {
            let id = self.engine.add_marker(MarkerSpec {
                coordinate: alert.coordinate,
                kind: MarkerKind::CriticalAlert,
                popup: Some(format!("CRITICAL ALERT\n{}", alert.message)),
            })?;
            log::debug!("Critical alert marker at {}", alert.coordinate);
            self.mounted.critical_marker = Some((id, alert));
        }
        Ok(())
    }

    fn sync_filter(&mut self) -> Result<(), MapError> {
        self.engine.set_filter(LayerId::Zones, self.filter.tier())
    }

    fn clear_hover(&mut self) -> Result<(), MapError> {
        if let Some(id) = self.mounted.hover_popup {
            self.engine.remove_popup(id)?;
            self.mounted.hover_popup = None;
        }
        Ok(())
    }
}

fn log_failure(result: Result<(), MapError>) {
    if let Err(e) = result {
        log::warn!("Map teardown: {e}");
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
