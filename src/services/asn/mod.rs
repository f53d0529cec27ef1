//! IP to ASN resolution.
//!
//! [`AsnResolver`] is a cache-aside reader: the cache store is consulted
//! first and a Team Cymru TXT query is the source of truth on a miss.
//! Successful resolutions, including "no records", are cached; failures are
//! not, so the next call retries DNS.

pub mod cache;
pub mod dns;

pub use cache::*;
pub use dns::*;

use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::metrics::AppMetrics;

/// ASN recorded when the origin zone has no answer for an address
pub const UNKNOWN_ASN: &str = "Unknown";

/// Errors raised while resolving an ASN
#[derive(Debug, Error)]
pub enum AsnError {
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    #[error("DNS lookup failed: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),

    #[error("malformed ASN record: {0:?}")]
    MalformedRecord(String),

    #[error("ASN cache store error: {0}")]
    Cache(String),
}

/// Cache-aside IP to ASN resolver shared by the ingestion path
pub struct AsnResolver {
    dns: Arc<dyn TxtResolver>,
    cache: Arc<dyn AsnCacheStore>,
    ttl: Duration,
    metrics: Option<AppMetrics>,
}

impl AsnResolver {
    pub fn new(dns: Arc<dyn TxtResolver>, cache: Arc<dyn AsnCacheStore>, ttl: Duration) -> Self {
        Self {
            dns,
            cache,
            ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_asn_lookup(result);
        }
    }

    /// Resolve the ASN announcing `ip`
    pub async fn resolve(&self, ip: &str) -> Result<String, AsnError> {
        let ip = ip.trim();
        let query = reverse_query_name(ip)?;

        match self.cache.get(ip).await {
            Ok(Some(asn)) => {
                debug!(ip = %ip, asn = %asn, "ASN found in cache");
                self.record("hit");
                return Ok(asn);
            }
            Ok(None) => debug!(ip = %ip, "ASN not found in cache"),
            Err(e) => warn!(ip = %ip, error = %e, "ASN cache read failed, querying DNS"),
        }

        let answers = match self.dns.lookup_txt(&query).await {
            Ok(answers) => answers,
            Err(e) => {
                self.record("error");
                return Err(e);
            }
        };

        let asn = match answers.first() {
            None => UNKNOWN_ASN.to_string(),
            Some(answer) => match parse_asn_record(answer) {
                Ok(record) => {
                    debug!(
                        ip = %ip,
                        asn = %record.asn,
                        network = %record.network,
                        country = %record.country,
                        "ASN resolved"
                    );
                    record.asn
                }
                Err(e) => {
                    self.record("error");
                    return Err(e);
                }
            },
        };

        self.record("miss");
        if let Err(e) = self.cache.set(ip, &asn, self.ttl).await {
            warn!(ip = %ip, error = %e, "Failed to cache ASN");
        }

        Ok(asn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTxt {
        answers: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TxtResolver for StaticTxt {
        async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, AsnError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers.clone())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl AsnCacheStore for BrokenCache {
        async fn get(&self, _ip: &str) -> Result<Option<String>, AsnError> {
            Err(AsnError::Cache("connection refused".to_string()))
        }

        async fn set(&self, _ip: &str, _asn: &str, _ttl: Duration) -> Result<(), AsnError> {
            Err(AsnError::Cache("connection refused".to_string()))
        }
    }

    fn resolver_with(answers: Vec<&str>, cache: Arc<dyn AsnCacheStore>) -> (AsnResolver, Arc<StaticTxt>) {
        let dns = Arc::new(StaticTxt {
            answers: answers.into_iter().map(String::from).collect(),
            calls: AtomicUsize::new(0),
        });
        let resolver = AsnResolver::new(dns.clone(), cache, Duration::from_secs(60));
        (resolver, dns)
    }

    #[tokio::test]
    async fn test_cache_store_failure_still_resolves() {
        let (resolver, dns) = resolver_with(vec!["15169 | 8.8.8.0/24 | US | arin | 1992-12-01"], Arc::new(BrokenCache));

        assert_eq!(resolver.resolve("8.8.8.8").await.unwrap(), "15169");
        assert_eq!(resolver.resolve("8.8.8.8").await.unwrap(), "15169");
        assert_eq!(dns.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_ip_skips_dns() {
        let cache = Arc::new(MemoryAsnCache::new());
        let (resolver, dns) = resolver_with(vec![], cache);

        assert!(matches!(
            resolver.resolve("10.0.0").await,
            Err(AsnError::InvalidIp(_))
        ));
        assert_eq!(dns.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_metrics_recorded() {
        let metrics = AppMetrics::new().unwrap();
        let cache = Arc::new(MemoryAsnCache::new());
        let (resolver, _) = resolver_with(vec!["13335 | 1.1.1.0/24 | AU | apnic | 2011-08-11"], cache);
        let resolver = resolver.with_metrics(metrics.clone());

        resolver.resolve("1.1.1.1").await.unwrap();
        resolver.resolve("1.1.1.1").await.unwrap();

        let output = metrics.render().unwrap();
        assert!(output.contains("asn_lookups_total{result=\"miss\"} 1"));
        assert!(output.contains("asn_lookups_total{result=\"hit\"} 1"));
    }

    #[tokio::test]
    async fn test_padded_ip_shares_cache_entry() {
        let cache = Arc::new(MemoryAsnCache::new());
        let (resolver, dns) = resolver_with(vec!["15169 | 8.8.8.0/24 | US | arin | 1992-12-01"], cache.clone());

        resolver.resolve(" 8.8.8.8 ").await.unwrap();
        assert_eq!(resolver.resolve("8.8.8.8").await.unwrap(), "15169");
        assert_eq!(dns.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("8.8.8.8").await.unwrap().as_deref(), Some("15169"));
    }
}
