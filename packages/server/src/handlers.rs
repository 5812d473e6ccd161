//! HTTP handler functions for the floodwatch stub upstream.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use floodwatch_feed_models::{ApiEnvelope, ApiErrorBody};
use floodwatch_location::{flood_risk_for, weather_for};
use floodwatch_server_models::{
    ApiHealth, INVALID_LOCATION_MESSAGE, LocationQueryError, LocationQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/location/flood-risk?lat=&lng=`
///
/// Zones, heatmap, and critical alert centred on the requested position.
pub async fn flood_risk(params: web::Query<LocationQueryParams>) -> HttpResponse {
    match params.coordinate() {
        Ok(at) => HttpResponse::Ok().json(ApiEnvelope::ok(flood_risk_for(at))),
        Err(e) => bad_location(&e),
    }
}

/// `GET /api/location/weather?lat=&lng=`
pub async fn weather(params: web::Query<LocationQueryParams>) -> HttpResponse {
    match params.coordinate() {
        Ok(at) => HttpResponse::Ok().json(ApiEnvelope::ok(weather_for(at))),
        Err(e) => bad_location(&e),
    }
}

/// `GET /api/location/community-updates?lat=&lng=&radius=`
///
/// Active alerts, newest first. Districts carry no coordinates, so every
/// active alert counts as nearby whatever the radius.
pub async fn community_updates(
    state: web::Data<AppState>,
    params: web::Query<LocationQueryParams>,
) -> HttpResponse {
    let at = match params.coordinate() {
        Ok(at) => at,
        Err(e) => return bad_location(&e),
    };
    log::trace!(
        "community updates near {at} (radius {:?} km)",
        params.radius_km()
    );

    HttpResponse::Ok().json(ApiEnvelope::ok(state.alerts.community_updates(Utc::now())))
}

fn bad_location(e: &LocationQueryError) -> HttpResponse {
    log::debug!("Rejecting request: {e}");
    HttpResponse::BadRequest().json(ApiErrorBody::new(INVALID_LOCATION_MESSAGE))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use super::*;
    use crate::routes;

    macro_rules! service {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState::seeded(Utc::now())))
                    .configure(routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = service!();
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(body.healthy);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn flood_risk_is_enveloped() {
        let app = service!();
        let req = test::TestRequest::get()
            .uri("/api/location/flood-risk?lat=28.6139&lng=77.209")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], Value::Bool(true));
        assert_eq!(body["message"], "Success");
        assert!(body["timestamp"].is_string());
        let zones = body["data"]["zones"].as_array().unwrap();
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[0]["risk"], "high");
        assert_eq!(zones[0]["waterLevel"], "4.2m");
        assert_eq!(
            body["data"]["criticalAlert"]["message"],
            "Flood Zone Alpha · 4.2m · Evacuate"
        );
    }

    #[actix_web::test]
    async fn missing_coordinates_use_the_fallback() {
        let app = service!();
        let req = test::TestRequest::get()
            .uri("/api/location/flood-risk")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let origin = body["data"]["heatmapPoints"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["intensity"] == 1.0)
            .unwrap();
        assert_eq!(origin["coordinates"], serde_json::json!([77.209, 28.6139]));
    }

    #[actix_web::test]
    async fn non_numeric_coordinates_are_rejected() {
        let app = service!();
        for uri in [
            "/api/location/weather?lat=abc&lng=77.2",
            "/api/location/flood-risk?lat=28.6&lng=east",
            "/api/location/community-updates?lat=95&lng=0",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(
                body,
                serde_json::json!({ "success": false, "message": "Invalid lat or lng" })
            );
        }
    }

    #[actix_web::test]
    async fn community_updates_lists_active_alerts() {
        let app = service!();
        let req = test::TestRequest::get()
            .uri("/api/location/community-updates?lat=28.6139&lng=77.209&radius=50")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let updates = body["data"]["updates"].as_array().unwrap();
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0]["district"], "Shamli");
        assert_eq!(updates[0]["time"], "4 min ago");
        assert!(updates.iter().all(|u| u["status"] == "ACTIVE"));
    }
}
