//! Key-value stores backing the weather lookup.
//!
//! Expiration is owned by the store: a value written with a TTL reads as
//! absent once the TTL has passed. Callers never inspect deadlines.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use wxcache_core::CacheError;

/// Minimal GET / SET-with-TTL interface the lookup needs.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Overwrites `key` with `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Cheap round-trip used at startup to verify the store is reachable.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed store sharing one multiplexed connection across all callers.
#[derive(Clone)]
pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisStore {
    /// Open a client for `url`, establish the shared connection and PING it.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::ConnectionFailed(format!("invalid Redis URL: {e}")))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("Redis connection error: {e}")))?;

        let store = Self { connection };
        store.ping().await?;
        Ok(store)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.connection.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(|e| CacheError::ReadFailed(format!("Redis GET error: {e}")))?;
        Ok(raw)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        // EX takes whole seconds and rejects 0.
        let secs = ttl.as_secs().max(1);
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(secs)
            .query_async(&mut con)
            .await
            .map_err(|e| CacheError::WriteFailed(format!("Redis SET error: {e}")))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut con)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("Redis PING error: {e}")))?;
        Ok(())
    }
}

/// In-process store with per-entry deadlines on the tokio clock.
///
/// Expired entries are purged lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => return Ok(None),
            Some((value, deadline)) if *deadline > Instant::now() => {
                return Ok(Some(value.clone()));
            }
            Some(_) => {}
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
