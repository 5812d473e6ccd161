//! Drives the real HTTP stack: the stub upstream on an ephemeral port,
//! polled through the reqwest gateway and the refresh scheduler.

use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::web;
use chrono::Utc;
use floodwatch_feed_models::{AlertStatus, GeoCoordinate, LocationFix, RiskTier};
use floodwatch_gateway::{FeedGateway, GatewayConfig, GatewayError, HttpGateway};
use floodwatch_location::{flood_risk_for, weather_for};
use floodwatch_refresh::{FeedStatus, RefreshConfig, RefreshScheduler, VisibilityTracker};
use floodwatch_server::{AppState, serve};

struct Upstream {
    base_url: String,
    handle: actix_web::dev::ServerHandle,
}

impl Upstream {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = web::Data::new(AppState::seeded(Utc::now()));
        let server = serve(listener, state, Some(1)).unwrap();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://127.0.0.1:{port}/api"),
            handle,
        }
    }

    fn gateway(&self) -> HttpGateway {
        HttpGateway::new(GatewayConfig {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn delhi() -> GeoCoordinate {
    GeoCoordinate::new(28.6139, 77.209).unwrap()
}

#[actix_web::test]
async fn gateway_decodes_every_feed() {
    let upstream = Upstream::start();
    let gateway = upstream.gateway();

    let flood = gateway.flood_risk(delhi()).await.unwrap();
    assert_eq!(flood, flood_risk_for(delhi()));
    let tiers: Vec<RiskTier> = flood.zones.iter().map(|z| z.risk_tier).collect();
    assert_eq!(tiers, RiskTier::all().to_vec());
    assert!(flood.critical_alert.is_some());

    let weather = gateway.weather(delhi()).await.unwrap();
    assert_eq!(weather, weather_for(delhi()));

    let community = gateway.community_updates(delhi(), 50.0).await.unwrap();
    assert_eq!(community.updates.len(), 4);
    assert!(
        community
            .updates
            .iter()
            .all(|u| u.status == AlertStatus::Active)
    );

    upstream.stop().await;
}

#[actix_web::test]
async fn malformed_query_is_a_bad_request() {
    let upstream = Upstream::start();

    let resp = reqwest::get(format!(
        "{}/location/weather?lat=abc&lng=77.2",
        upstream.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], serde_json::Value::Bool(false));
    assert_eq!(body["message"], "Invalid lat or lng");

    upstream.stop().await;
}

#[actix_web::test]
async fn unknown_route_maps_to_http_error() {
    let upstream = Upstream::start();
    let gateway = HttpGateway::new(GatewayConfig {
        base_url: format!("{}/missing", upstream.base_url),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap();

    let err = gateway.weather(delhi()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Http { status: 404, .. }), "{err}");

    upstream.stop().await;
}

#[actix_web::test]
async fn scheduler_fills_state_from_live_upstream() {
    let upstream = Upstream::start();
    let gateway: Arc<dyn FeedGateway> = Arc::new(upstream.gateway());
    let tracker = VisibilityTracker::new(true);

    let scheduler = RefreshScheduler::start(
        gateway,
        RefreshConfig::default(),
        LocationFix::live(delhi()),
        tracker.subscribe(),
    );
    scheduler.refresh_all().await;

    let state = scheduler.snapshot();
    assert!(!state.any_loading());
    assert_eq!(state.flood_risk.status(), FeedStatus::Ready);
    assert_eq!(state.weather.status(), FeedStatus::Ready);
    assert_eq!(state.community_updates.status(), FeedStatus::Ready);
    assert_eq!(
        state.flood_risk.data.as_deref(),
        Some(&flood_risk_for(delhi()))
    );

    scheduler.dispose();
    upstream.stop().await;
}
