use std::env;
use std::time::Duration;

use chart_render::DEFAULT_ECHARTS_URL;
use chrono_tz::Tz;
use quote_client::DEFAULT_TIMEOUT;

/// Server configuration, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,

    // ── Upstream quote API ─────────────────────────────────────────
    /// Base URL; the asset identifier is appended verbatim.
    pub api_url: String,
    /// Asset charted when the request has no `a` parameter.
    pub default_asset: String,
    pub quote_timeout: Duration,

    // ── Display ────────────────────────────────────────────────────
    /// Zone name as configured (may be invalid).
    pub zone_name: String,
    /// Resolved display zone; UTC when `zone_name` is unknown.
    pub zone: Tz,
    pub echarts_url: String,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Whole seconds; zero counts as unset since it would fail every request.
fn env_timeout(name: &str, default: Duration) -> Duration {
    match env_u64(name, 0) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let zone_name = env_str("CITY", "");
        let zone = match ts_core::parse_zone(&zone_name) {
            Some(zone) => zone,
            None => {
                tracing::warn!(zone = %zone_name, "unknown time zone, using UTC");
                Tz::UTC
            }
        };

        let api_url = env_str("API_URL", "");
        if api_url.is_empty() {
            tracing::warn!("API_URL is not set; every chart request will fail");
        }

        Self {
            bind: env_str("CHART_BIND", "0.0.0.0"),
            port: env_u16("PORT", 8080),
            api_url,
            default_asset: env_str("ASSET", ""),
            quote_timeout: env_timeout("QUOTE_TIMEOUT_SECS", DEFAULT_TIMEOUT),
            zone_name,
            zone,
            echarts_url: env_str("ECHARTS_ASSET_URL", DEFAULT_ECHARTS_URL),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
