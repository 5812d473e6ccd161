//! In-memory community alert board.
//!
//! The board is seeded from `alerts/seed.toml`, embedded at compile time,
//! with issue times expressed relative to when the board is loaded.

use chrono::{DateTime, Duration, Utc};
use floodwatch_feed_models::{
    AlertSeverity, AlertStatus, CommunityUpdate, CommunityUpdatesPayload, relative_time,
};
use serde::Deserialize;

/// Maximum number of updates returned per request.
pub const MAX_UPDATES: usize = 10;

const SEED_TOML: &str = include_str!("../alerts/seed.toml");

/// An alert with its absolute issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub id: String,
    pub district: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub status: AlertStatus,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    alerts: Vec<SeedAlert>,
}

#[derive(Debug, Deserialize)]
struct SeedAlert {
    id: String,
    district: String,
    severity: AlertSeverity,
    title: String,
    message: String,
    issued_minutes_ago: i64,
    status: AlertStatus,
}

/// Alerts known to the upstream.
#[derive(Debug, Clone, Default)]
pub struct AlertBoard {
    alerts: Vec<AlertRecord>,
}

impl AlertBoard {
    #[must_use]
    pub const fn new(alerts: Vec<AlertRecord>) -> Self {
        Self { alerts }
    }

    /// Loads the embedded seed alerts, anchoring their issue times to `now`.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a compile-time guarantee
    /// since the seed is embedded).
    #[must_use]
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let seed: SeedFile = toml::de::from_str(SEED_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded alert seed: {e}"));

        let alerts: Vec<AlertRecord> = seed
            .alerts
            .into_iter()
            .map(|a| AlertRecord {
                id: a.id,
                district: a.district,
                severity: a.severity,
                title: a.title,
                message: a.message,
                issued_at: now - Duration::minutes(a.issued_minutes_ago),
                status: a.status,
            })
            .collect();

        log::debug!("Seeded alert board with {} alerts", alerts.len());

        Self { alerts }
    }

    /// Active alerts, newest first, at most [`MAX_UPDATES`], with relative
    /// times computed against `now`.
    #[must_use]
    pub fn community_updates(&self, now: DateTime<Utc>) -> CommunityUpdatesPayload {
        let mut active: Vec<&AlertRecord> = self
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .collect();
        active.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));

        let updates = active
            .into_iter()
            .take(MAX_UPDATES)
            .map(|a| CommunityUpdate {
                id: a.id.clone(),
                district_name: a.district.clone(),
                severity: a.severity,
                title: a.title.clone(),
                message: a.message.clone(),
                relative_time: relative_time(a.issued_at, now),
                status: a.status,
            })
            .collect();

        CommunityUpdatesPayload { updates }
    }
}
