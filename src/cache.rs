//! Cache-aside layer over an optional Redis transport.
//!
//! The cache is best-effort infrastructure: no configured endpoint means
//! every lookup is a miss, and any transport or decode failure is recovered
//! silently as a miss. A cache problem must never turn an otherwise
//! successful read into a failure, and a failed write must never delay a
//! response that is already computed.

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const ENV_REDIS_URL: &str = "REDIS_URL";

/// TTLs by result class. Reference data is cheap and stable; trending pages
/// are expensive to recompute but filter-combination sensitive, so they sit
/// in the middle.
pub const TTL_REFERENCE_SECS: u64 = 300;
pub const TTL_CONTENT_SECS: u64 = 60;
pub const TTL_TRENDING_SECS: u64 = 120;

/// Placeholder for absent fingerprint parts. Absent parameters are encoded,
/// not omitted, so requests that differ only in which parameter is missing
/// cannot collide.
const ABSENT: &str = "~";

/// Deterministic cache key over every request-distinguishing parameter.
/// Lowercased so filter values differing only in case share an entry.
pub fn fingerprint(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .map(|p| p.unwrap_or(ABSENT))
        .collect::<Vec<_>>()
        .join(":")
        .to_lowercase()
}

/// Get/set-with-TTL transport. Implemented by Redis in production and by
/// in-memory fakes in tests.
#[async_trait::async_trait]
pub trait CacheTransport: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}

/// Redis transport over a `ConnectionManager` (auto-reconnecting).
pub struct RedisTransport {
    conn: ConnectionManager,
}

impl RedisTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheTransport for RedisTransport {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }
}

/// Cache handle shared through `AppState`. Cloning is cheap.
#[derive(Clone)]
pub struct Cache {
    transport: Option<Arc<dyn CacheTransport>>,
}

impl Cache {
    pub fn new(transport: Arc<dyn CacheTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A cache that always misses and never errors.
    pub fn disabled() -> Self {
        Self { transport: None }
    }

    /// Connect from `REDIS_URL`. Unset -> disabled; unreachable -> disabled
    /// with a warning. Startup never fails on the cache.
    pub async fn from_env() -> Self {
        let Ok(url) = std::env::var(ENV_REDIS_URL) else {
            debug!("REDIS_URL not set; cache disabled");
            return Self::disabled();
        };
        if url.trim().is_empty() {
            return Self::disabled();
        }
        match RedisTransport::connect(&url).await {
            Ok(t) => Self::new(Arc::new(t)),
            Err(err) => {
                warn!(error = %err, "redis unavailable; cache disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Look up a cached JSON document. Every failure mode (transport error,
    /// malformed payload) is a miss.
    pub async fn get_json(&self, key: &str) -> Option<Value> {
        let transport = self.transport.as_ref()?;
        match transport.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    counter!("trendfeed_cache_hits_total").increment(1);
                    Some(value)
                }
                Err(err) => {
                    warn!(%key, error = %err, "malformed cached payload; treating as miss");
                    counter!("trendfeed_cache_misses_total").increment(1);
                    None
                }
            },
            Ok(None) => {
                counter!("trendfeed_cache_misses_total").increment(1);
                None
            }
            Err(err) => {
                warn!(%key, error = %err, "cache get failed; treating as miss");
                counter!("trendfeed_cache_errors_total").increment(1);
                None
            }
        }
    }

    /// Fire-and-forget write on a spawned task; the response does not wait
    /// for it and a failure only logs.
    pub fn put_detached<T: Serialize>(&self, key: String, value: &T, ttl_secs: u64) {
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(err) => {
                warn!(%key, error = %err, "failed to serialize cache payload");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(err) = transport.set(&key, &payload, ttl_secs).await {
                warn!(%key, error = %err, "cache set failed");
            }
        });
    }
}
