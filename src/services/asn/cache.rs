//! Key/value stores holding resolved IP to ASN mappings.

use async_trait::async_trait;
use moka::{Expiry, future::Cache};
use redis::{AsyncCommands, aio::ConnectionManager};
use std::time::{Duration, Instant};

use super::AsnError;

/// Upper bound on mappings held in process
const MEMORY_CACHE_CAPACITY: u64 = 1_000_000;

/// Cache-aside store keyed by IP string
///
/// A miss is `Ok(None)`, never an error.
#[async_trait]
pub trait AsnCacheStore: Send + Sync {
    async fn get(&self, ip: &str) -> Result<Option<String>, AsnError>;
    async fn set(&self, ip: &str, asn: &str, ttl: Duration) -> Result<(), AsnError>;
}

#[derive(Clone)]
struct CachedAsn {
    asn: String,
    ttl: Duration,
}

/// Expires each mapping after the TTL it was stored with
struct PerEntryTtl;

impl Expiry<String, CachedAsn> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _ip: &String,
        value: &CachedAsn,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _ip: &String,
        value: &CachedAsn,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local store, lost on restart
pub struct MemoryAsnCache {
    entries: Cache<String, CachedAsn>,
}

impl MemoryAsnCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MEMORY_CACHE_CAPACITY)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryAsnCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsnCacheStore for MemoryAsnCache {
    async fn get(&self, ip: &str) -> Result<Option<String>, AsnError> {
        Ok(self.entries.get(ip).await.map(|cached| cached.asn))
    }

    async fn set(&self, ip: &str, asn: &str, ttl: Duration) -> Result<(), AsnError> {
        let cached = CachedAsn {
            asn: asn.to_string(),
            ttl,
        };
        self.entries.insert(ip.to_string(), cached).await;
        Ok(())
    }
}

/// Redis-backed store shared by every relay instance
pub struct RedisAsnCache {
    conn: ConnectionManager,
}

impl RedisAsnCache {
    /// Connect and verify the server is reachable
    pub async fn connect(url: &str) -> Result<Self, AsnError> {
        let client = redis::Client::open(url).map_err(|e| AsnError::Cache(e.to_string()))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AsnError::Cache(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AsnError::Cache(e.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl AsnCacheStore for RedisAsnCache {
    async fn get(&self, ip: &str) -> Result<Option<String>, AsnError> {
        let mut conn = self.conn.clone();
        conn.get(ip)
            .await
            .map_err(|e| AsnError::Cache(e.to_string()))
    }

    async fn set(&self, ip: &str, asn: &str, ttl: Duration) -> Result<(), AsnError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(ip, asn, ttl.as_secs())
            .await
            .map_err(|e| AsnError::Cache(e.to_string()))
    }
}
