//! ASN resolution cache settings.

use std::{env, time::Duration};

/// Seven days, the lifetime of a cached IP to ASN mapping
pub const DEFAULT_ASN_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Configuration for the ASN cache store
#[derive(Debug, Clone)]
pub struct AsnConfig {
    /// Redis connection string; the in-process cache is used when unset
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
}

impl Default for AsnConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            cache_ttl_seconds: DEFAULT_ASN_CACHE_TTL_SECONDS,
        }
    }
}

impl AsnConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());

        let cache_ttl_seconds = env::var("ASN_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ASN_CACHE_TTL_SECONDS);

        Self {
            redis_url,
            cache_ttl_seconds,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}
