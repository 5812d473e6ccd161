//! Text dashboard: one panel per feed plus the map status.
//!
//! A panel keeps showing its last good snapshot after a failed refresh and
//! marks it stale. Only a map load failure replaces the map panel.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use floodwatch_feed_models::{
    CommunityUpdatesPayload, Feed, FloodRiskSnapshot, WeatherSnapshot, relative_time,
};
use floodwatch_map::{MapError, MapStatus, RiskFilter};
use floodwatch_refresh::{FeedState, RefreshState};

/// Everything one render needs.
#[derive(Debug, Clone, Copy)]
pub struct Dashboard<'a> {
    pub state: &'a RefreshState,
    pub seconds_remaining: u64,
    pub map_status: MapStatus,
    pub map_error: Option<&'a MapError>,
    pub filter: RiskFilter,
    pub now: DateTime<Utc>,
}

impl Dashboard<'_> {
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let state = self.state;

        let source = if state.location.is_live {
            "live GPS"
        } else {
            "default center"
        };
        let visibility = if state.visible { "visible" } else { "paused" };
        let _ = writeln!(
            out,
            "== Floodwatch @ {} ({source}) · {visibility} · next refresh in {}s ==",
            state.location.coordinate, self.seconds_remaining
        );

        self.render_map(&mut out);
        self.render_flood_risk(&mut out);
        self.render_weather(&mut out);
        self.render_community(&mut out);

        out
    }

    fn render_map(&self, out: &mut String) {
        if self.map_status == MapStatus::Error {
            let _ = writeln!(out, "+--------------------------------------+");
            let _ = writeln!(out, "| MAP UNAVAILABLE                      |");
            let _ = writeln!(out, "+--------------------------------------+");
            if let Some(e) = self.map_error {
                let _ = writeln!(out, "  {e}");
            }
            let _ = writeln!(out, "  Restart to reload the map.");
            return;
        }
        let _ = writeln!(
            out,
            "[Map] {} · filter: {}",
            self.map_status,
            self.filter.label()
        );
    }

    fn render_flood_risk(&self, out: &mut String) {
        let feed = &self.state.flood_risk;
        self.panel_header(out, Feed::FloodRisk, feed);
        let Some(snapshot) = body(out, feed) else {
            return;
        };
        render_zones(out, snapshot, self.filter);
    }

    fn render_weather(&self, out: &mut String) {
        let feed = &self.state.weather;
        self.panel_header(out, Feed::Weather, feed);
        if let Some(weather) = body(out, feed) {
            render_weather(out, weather);
        }
    }

    fn render_community(&self, out: &mut String) {
        let feed = &self.state.community_updates;
        self.panel_header(out, Feed::CommunityUpdates, feed);
        if let Some(payload) = body(out, feed) {
            render_updates(out, payload);
        }
    }

    fn panel_header<T>(&self, out: &mut String, feed: Feed, state: &FeedState<T>) {
        let _ = write!(out, "[{}]", feed.label());
        if let Some(at) = state.last_updated {
            let _ = write!(out, " updated {}", relative_time(at, self.now).to_lowercase());
        }
        if state.loading {
            let _ = write!(out, " · refreshing");
        }
        if state.is_stale() {
            let _ = write!(out, " · STALE");
        }
        out.push('\n');
        if let Some(error) = &state.error {
            let _ = writeln!(out, "  ! {error}");
        }
    }
}

/// The snapshot to draw, or a placeholder line when there is none.
fn body<'a, T>(out: &mut String, state: &'a FeedState<T>) -> Option<&'a T> {
    if let Some(data) = state.data.as_deref() {
        return Some(data);
    }
    let placeholder = if state.loading {
        "Loading..."
    } else if state.error.is_some() {
        "No data available"
    } else {
        "Waiting for first refresh"
    };
    let _ = writeln!(out, "  {placeholder}");
    None
}

fn render_zones(out: &mut String, snapshot: &FloodRiskSnapshot, filter: RiskFilter) {
    let mut shown = 0;
    for zone in snapshot.zones.iter().filter(|z| filter.matches(z.risk_tier)) {
        let tier = zone.risk_tier.to_string().to_uppercase();
        let _ = writeln!(
            out,
            "  {tier:<6} {:<22} water {}",
            zone.name, zone.water_level
        );
        shown += 1;
    }
    if shown == 0 {
        let _ = writeln!(out, "  No {} zones", filter.label().to_lowercase());
    }
    let _ = writeln!(out, "  {} sensor readings", snapshot.heatmap_points.len());
    if let Some(alert) = &snapshot.critical_alert {
        let _ = writeln!(out, "  CRITICAL ALERT at {}: {}", alert.coordinate, alert.message);
    }
}

fn render_weather(out: &mut String, weather: &WeatherSnapshot) {
    let _ = writeln!(
        out,
        "  {} · {:.0}°C · humidity {:.0}% · rain {:.0} mm",
        weather.condition, weather.temperature, weather.humidity, weather.precipitation
    );
    let _ = writeln!(
        out,
        "  wind {:.0} km/h · pressure {:.0} hPa",
        weather.wind_speed, weather.pressure
    );
}

fn render_updates(out: &mut String, payload: &CommunityUpdatesPayload) {
    if payload.updates.is_empty() {
        let _ = writeln!(out, "  No active alerts nearby");
        return;
    }
    for update in &payload.updates {
        let marker = if update.severity.is_urgent() { "!" } else { " " };
        let _ = writeln!(
            out,
            " {marker}{:<9} {}: {} ({})",
            update.severity.to_string(),
            update.district_name,
            update.title,
            update.relative_time
        );
    }
}
