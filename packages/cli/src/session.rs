//! One running dashboard: scheduler, countdown, and map kept in step.

use std::sync::Arc;

use chrono::Utc;
use floodwatch_feed_models::{LocationFix, RiskTier};
use floodwatch_gateway::FeedGateway;
use floodwatch_map::{HeadlessEngine, MapEngine, MapError, MapRenderer, MapStatus};
use floodwatch_refresh::{
    Countdown, RefreshConfig, RefreshScheduler, RefreshState, VisibilityTracker,
};
use tokio::sync::watch;

use crate::{
    command::{HELP, WatchCommand},
    summary::Dashboard,
};

/// What the caller should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

pub struct Session<E: MapEngine> {
    tracker: VisibilityTracker,
    scheduler: RefreshScheduler,
    countdown: Countdown,
    renderer: MapRenderer<E>,
}

impl<E: MapEngine> Session<E> {
    /// Starts polling from `location` with the view visible and mounts the
    /// map. A map that fails to load, or loads but rejects its initial
    /// setup, leaves the session running.
    pub async fn start(
        gateway: Arc<dyn FeedGateway>,
        config: RefreshConfig,
        location: LocationFix,
        engine: E,
    ) -> Self {
        let cadence = config.flood_risk_cadence;
        let tracker = VisibilityTracker::new(true);
        let scheduler = RefreshScheduler::start(gateway, config, location, tracker.subscribe());
        let countdown = Countdown::spawn(cadence, scheduler.subscribe(), tracker.subscribe());

        let mut renderer = MapRenderer::new(engine, location);
        match renderer.mount().await {
            Ok(MapStatus::Error) => log::warn!("Continuing without a map"),
            Ok(_) => {}
            Err(e) => log::error!("Map setup failed: {e}"),
        }

        Self {
            tracker,
            scheduler,
            countdown,
            renderer,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.scheduler.subscribe()
    }

    #[must_use]
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.tracker.is_visible()
    }

    #[must_use]
    pub const fn renderer(&self) -> &MapRenderer<E> {
        &self.renderer
    }

    /// Pushes the latest scheduler state onto the map.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects an update.
    pub fn sync_map(&mut self) -> Result<(), MapError> {
        self.renderer.apply(&self.scheduler.snapshot())
    }

    #[must_use]
    pub fn dashboard(&self) -> String {
        let state = self.scheduler.snapshot();
        Dashboard {
            state: &state,
            seconds_remaining: self.countdown.seconds(),
            map_status: self.renderer.status(),
            map_error: self.renderer.error(),
            filter: self.renderer.filter(),
            now: Utc::now(),
        }
        .render()
    }

    /// Refreshes every feed, waits for them to settle, and syncs the map.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Engine`] if the engine rejects an update.
    pub async fn refresh_all(&mut self) -> Result<(), MapError> {
        self.scheduler.refresh_all().await;
        self.sync_map()
    }

    /// Runs one command. A map update the engine rejects is logged and
    /// reported in the reply; the feeds keep polling either way.
    pub async fn handle(&mut self, command: WatchCommand) -> Reply {
        match self.run(command).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Map update failed: {e}");
                Reply::Print(format!("Map update failed: {e}"))
            }
        }
    }

    async fn run(&mut self, command: WatchCommand) -> Result<Reply, MapError> {
        let text = match command {
            WatchCommand::Hide => {
                self.tracker.set_visible(false);
                "View hidden; polling paused".to_string()
            }
            WatchCommand::Show => {
                self.tracker.set_visible(true);
                "View visible; polling resumed".to_string()
            }
            WatchCommand::Refresh(None) => {
                self.refresh_all().await?;
                self.dashboard()
            }
            WatchCommand::Refresh(Some(feed)) => {
                self.scheduler.refresh(feed).await;
                self.sync_map()?;
                self.dashboard()
            }
            WatchCommand::Filter(filter) => {
                self.renderer.set_filter(filter)?;
                format!("Zone filter: {}", filter.label())
            }
            WatchCommand::Goto(at) => {
                let fix = LocationFix::live(at);
                self.scheduler.set_location(fix);
                self.renderer.set_user_location(fix)?;
                format!("Location set to {at}")
            }
            WatchCommand::Hover(at) => match self.renderer.hover(Some(at))? {
                Some(zone) => format!(
                    "{} · {} risk · water {}",
                    zone.name,
                    tier_label(zone.risk_tier),
                    zone.water_level
                ),
                None => format!("No visible zone at {at}"),
            },
            WatchCommand::Summary => self.dashboard(),
            WatchCommand::Help => HELP.to_string(),
            WatchCommand::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Print(text))
    }

    /// Tears down the map and stops every timer and request.
    pub fn close(mut self) {
        self.renderer.teardown();
        self.scheduler.dispose();
    }
}

impl Session<HeadlessEngine> {
    /// The current map scene as pretty-printed `GeoJSON`.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn export_geojson(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.renderer.engine().scene().export())
    }
}

const fn tier_label(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::High => "High",
        RiskTier::Medium => "Medium",
        RiskTier::Low => "Low",
    }
}

#[cfg(test)]
mod tests {
    use floodwatch_feed_models::{
        CommunityUpdatesPayload, Feed, FloodRiskSnapshot, GeoCoordinate, WeatherSnapshot,
    };
    use floodwatch_gateway::GatewayError;
    use floodwatch_location::{alerts::AlertBoard, flood_risk_for, weather_for};
    use floodwatch_map::{
        MapOptions, RiskFilter,
        engine::{
            Camera, ControlId, ControlKind, LayerId, MarkerId, MarkerKind, MarkerSpec, PopupId,
            PopupSpec,
        },
    };

    use super::*;

    struct LocalGateway;

    #[async_trait::async_trait]
    impl FeedGateway for LocalGateway {
        async fn flood_risk(&self, at: GeoCoordinate) -> Result<FloodRiskSnapshot, GatewayError> {
            Ok(flood_risk_for(at))
        }

        async fn weather(&self, at: GeoCoordinate) -> Result<WeatherSnapshot, GatewayError> {
            Ok(weather_for(at))
        }

        async fn community_updates(
            &self,
            _at: GeoCoordinate,
            _radius_km: f64,
        ) -> Result<CommunityUpdatesPayload, GatewayError> {
            Ok(AlertBoard::seeded(Utc::now()).community_updates(Utc::now()))
        }
    }

    /// Loads fine but rejects every layer update.
    #[derive(Default)]
    struct LayerlessEngine(HeadlessEngine);

    #[async_trait::async_trait]
    impl MapEngine for LayerlessEngine {
        async fn initialize(&mut self, options: &MapOptions) -> Result<(), MapError> {
            self.0.initialize(options).await
        }

        fn set_layer_data(
            &mut self,
            layer: LayerId,
            _data: geojson::FeatureCollection,
        ) -> Result<(), MapError> {
            Err(MapError::Engine {
                message: format!("layer {layer} rejected"),
            })
        }

        fn add_marker(&mut self, spec: MarkerSpec) -> Result<MarkerId, MapError> {
            self.0.add_marker(spec)
        }

        fn move_marker(&mut self, id: MarkerId, to: GeoCoordinate) -> Result<(), MapError> {
            self.0.move_marker(id, to)
        }

        fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError> {
            self.0.remove_marker(id)
        }

        fn add_control(&mut self, kind: ControlKind) -> Result<ControlId, MapError> {
            self.0.add_control(kind)
        }

        fn remove_control(&mut self, id: ControlId) -> Result<(), MapError> {
            self.0.remove_control(id)
        }

        fn add_popup(&mut self, spec: PopupSpec) -> Result<PopupId, MapError> {
            self.0.add_popup(spec)
        }

        fn remove_popup(&mut self, id: PopupId) -> Result<(), MapError> {
            self.0.remove_popup(id)
        }

        fn set_filter(&mut self, layer: LayerId, tier: Option<RiskTier>) -> Result<(), MapError> {
            self.0.set_filter(layer, tier)
        }

        fn ease_to(&mut self, camera: Camera) -> Result<(), MapError> {
            self.0.ease_to(camera)
        }

        fn destroy(&mut self) {
            self.0.destroy();
        }
    }

    fn delhi() -> GeoCoordinate {
        GeoCoordinate::new(28.6139, 77.209).unwrap()
    }

    async fn session() -> Session<HeadlessEngine> {
        let mut session = Session::start(
            Arc::new(LocalGateway),
            RefreshConfig::default(),
            LocationFix::live(delhi()),
            HeadlessEngine::new(),
        )
        .await;
        session.refresh_all().await.unwrap();
        session
    }

    fn printed(reply: Reply) -> String {
        match reply {
            Reply::Print(text) => text,
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn refresh_fills_dashboard_and_map() {
        let session = session().await;

        let text = session.dashboard();
        assert!(text.contains("North District Hub"));
        assert!(text.contains("[Map] ready"));

        let scene = session.renderer().engine().scene();
        assert_eq!(scene.markers_of(MarkerKind::CriticalAlert).count(), 1);
        assert_eq!(scene.markers_of(MarkerKind::UserLive).count(), 1);

        session.close();
    }

    #[tokio::test]
    async fn visibility_commands_drive_the_tracker() {
        let mut session = session().await;

        printed(session.handle(WatchCommand::Hide).await);
        assert!(!session.is_visible());
        printed(session.handle(WatchCommand::Show).await);
        assert!(session.is_visible());
        assert_eq!(session.handle(WatchCommand::Quit).await, Reply::Quit);

        session.close();
    }

    #[tokio::test]
    async fn filter_and_hover_stay_local() {
        let mut session = session().await;
        let inside_high = GeoCoordinate::new(28.6139, 77.2).unwrap();

        let text = printed(session.handle(WatchCommand::Hover(inside_high)).await);
        assert_eq!(text, "North District Hub · High risk · water 4.2m");

        printed(
            session
                .handle(WatchCommand::Filter(RiskFilter::Low))
                .await,
        );
        assert_eq!(session.renderer().filter(), RiskFilter::Low);
        let text = printed(session.handle(WatchCommand::Hover(inside_high)).await);
        assert!(text.starts_with("No visible zone"));

        session.close();
    }

    #[tokio::test]
    async fn goto_moves_marker_and_refetches_for_new_position() {
        let mut session = session().await;
        let kolkata = GeoCoordinate::new(22.5726, 88.3639).unwrap();

        printed(session.handle(WatchCommand::Goto(kolkata)).await);
        printed(
            session
                .handle(WatchCommand::Refresh(Some(Feed::FloodRisk)))
                .await,
        );

        let state = session.subscribe().borrow().clone();
        assert_eq!(state.location.coordinate, kolkata);
        assert_eq!(state.flood_risk.data.as_deref(), Some(&flood_risk_for(kolkata)));

        let scene = session.renderer().engine().scene();
        let (_, user) = scene.markers_of(MarkerKind::UserLive).next().unwrap();
        assert_eq!(user.coordinate, kolkata);

        session.close();
    }

    #[tokio::test]
    async fn export_includes_layers_and_markers() {
        let session = session().await;

        let json: serde_json::Value =
            serde_json::from_str(&session.export_geojson().unwrap()).unwrap();
        let features = json["features"].as_array().unwrap();
        assert!(features.iter().any(|f| f["properties"]["name"] == "North District Hub"));
        assert!(features.len() > 3);

        session.close();
    }

    #[tokio::test]
    async fn failed_map_load_keeps_feeds_running() {
        let mut session = Session::start(
            Arc::new(LocalGateway),
            RefreshConfig::default(),
            LocationFix::live(delhi()),
            HeadlessEngine::failing("tile server unreachable"),
        )
        .await;
        session.refresh_all().await.unwrap();

        assert_eq!(session.renderer().status(), MapStatus::Error);
        let text = session.dashboard();
        assert!(text.contains("MAP UNAVAILABLE"));
        assert!(text.contains("North District Hub"));

        session.close();
    }

    #[tokio::test]
    async fn rejected_map_updates_keep_the_session_running() {
        let mut session = Session::start(
            Arc::new(LocalGateway),
            RefreshConfig::default(),
            LocationFix::live(delhi()),
            LayerlessEngine::default(),
        )
        .await;
        assert_eq!(session.renderer().status(), MapStatus::Ready);

        let text = printed(session.handle(WatchCommand::Refresh(None)).await);
        assert!(text.starts_with("Map update failed: Map engine error: layer"));
        assert!(session.sync_map().is_err());

        let state = session.subscribe().borrow().clone();
        assert_eq!(state.flood_risk.data.as_deref(), Some(&flood_risk_for(delhi())));
        assert!(state.weather.data.is_some());

        printed(session.handle(WatchCommand::Hide).await);
        assert!(!session.is_visible());
        let text = printed(session.handle(WatchCommand::Summary).await);
        assert!(text.contains("North District Hub"));

        session.close();
    }
}
