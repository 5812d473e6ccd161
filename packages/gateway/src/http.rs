//! `reqwest` implementation of [`FeedGateway`].
//!
//! Every call is a single `GET` against the upstream location API. The
//! body is read as text first so parse failures can log what actually
//! arrived, then decoded from the `{ data: T }` envelope (or from the bare
//! body when no `data` member is present).

use floodwatch_feed_models::{
    ApiErrorBody, CommunityUpdatesPayload, FloodRiskSnapshot, GeoCoordinate, WeatherSnapshot,
};
use serde::de::DeserializeOwned;

use crate::{FeedGateway, GatewayConfig, GatewayError};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// HTTP client for the upstream location endpoints.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Builds a gateway whose client enforces `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be
    /// constructed (e.g. the TLS backend fails to initialise).
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Sends one `GET` and decodes the enveloped payload.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, f64)],
    ) -> Result<T, GatewayError> {
        let url = self.config.endpoint(path);
        log::trace!("GET {url} {query:?}");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string()
                });
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message,
            });
        }

        decode(&text).inspect_err(|e| {
            log::warn!(
                "Failed to decode response from {url}: {e}\n  body preview: {}",
                preview(&text)
            );
        })
    }

    /// Maps a `reqwest` failure onto the gateway taxonomy.
    fn classify(&self, e: &reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.config.request_timeout)
        } else if e.is_decode() {
            GatewayError::Parse {
                message: e.to_string(),
            }
        } else {
            GatewayError::Transport {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl FeedGateway for HttpGateway {
    async fn flood_risk(&self, at: GeoCoordinate) -> Result<FloodRiskSnapshot, GatewayError> {
        let snapshot: FloodRiskSnapshot = self
            .get(
                "location/flood-risk",
                &[("lat", at.latitude()), ("lng", at.longitude())],
            )
            .await?;
        snapshot.validate().map_err(|e| GatewayError::Parse {
            message: e.to_string(),
        })?;
        Ok(snapshot)
    }

    async fn weather(&self, at: GeoCoordinate) -> Result<WeatherSnapshot, GatewayError> {
        self.get(
            "location/weather",
            &[("lat", at.latitude()), ("lng", at.longitude())],
        )
        .await
    }

    async fn community_updates(
        &self,
        at: GeoCoordinate,
        radius_km: f64,
    ) -> Result<CommunityUpdatesPayload, GatewayError> {
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(GatewayError::InvalidCoordinate {
                message: format!("search radius must be positive, got {radius_km} km"),
            });
        }
        self.get(
            "location/community-updates",
            &[
                ("lat", at.latitude()),
                ("lng", at.longitude()),
                ("radius", radius_km),
            ],
        )
        .await
    }
}

/// Decodes a response body, unwrapping the `data` envelope when present.
fn decode<T: DeserializeOwned>(text: &str) -> Result<T, GatewayError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| GatewayError::Parse {
        message: format!("invalid JSON: {e}"),
    })?;
    serde_json::from_value(unwrap_envelope(value)).map_err(|e| GatewayError::Parse {
        message: format!("unexpected payload shape: {e}"),
    })
}

/// Returns the envelope's `data` member, or the whole body when `data` is
/// missing or `null`.
fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                serde_json::Value::Object(map)
            }
            None => serde_json::Value::Object(map),
        },
        other => other,
    }
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
