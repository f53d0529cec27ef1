//! Riemann event store connection settings.

use std::env;

/// Where forwarded metrics and alert events are published
#[derive(Debug, Clone)]
pub struct RiemannConfig {
    pub address: String,
    pub connect_timeout_seconds: u64,
    /// Bound on writing one event and reading its acknowledgement
    pub io_timeout_seconds: u64,
}

impl Default for RiemannConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5555".to_string(),
            connect_timeout_seconds: 10,
            io_timeout_seconds: 5,
        }
    }
}

impl RiemannConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let address =
            env::var("RIEMANN_ADDRESS").unwrap_or_else(|_| "127.0.0.1:5555".to_string());

        let connect_timeout_seconds = env::var("RIEMANN_CONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let io_timeout_seconds = env::var("RIEMANN_IO_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(5);

        Self {
            address,
            connect_timeout_seconds,
            io_timeout_seconds,
        }
    }
}
