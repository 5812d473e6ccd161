//! Gateway configuration from the environment.

use std::time::Duration;

/// Base URL used when `FLOODWATCH_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

/// Per-request timeout used when `FLOODWATCH_REQUEST_TIMEOUT_SECS` is unset.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Where and how the gateway talks to the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// API root, without the `/location/...` suffix.
    pub base_url: String,
    /// Upper bound on a single request, connect through body.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Reads `FLOODWATCH_API_URL` and `FLOODWATCH_REQUEST_TIMEOUT_SECS`,
    /// falling back to the defaults for missing or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("FLOODWATCH_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let request_timeout = std::env::var("FLOODWATCH_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Self {
            base_url,
            request_timeout,
        }
    }

    /// Joins `path` onto the base URL with exactly one separating slash.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
