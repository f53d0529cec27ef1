//! Prometheus endpoint switch.

use std::env;

/// Whether `/api/metrics` serves the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl MetricsConfig {
    /// `METRICS_ENABLED`; anything unrecognized keeps metrics on
    pub fn from_env() -> Self {
        let enabled = env::var("METRICS_ENABLED")
            .ok()
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(true);

        Self { enabled }
    }
}
