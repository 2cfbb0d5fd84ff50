//! Read-through weather lookup.
//!
//! A miss is fetched from the provider at most once per key at a time:
//! concurrent callers for the same location join the running fetch and share
//! its outcome. Provider failures are remembered for a short window so an
//! outage is not hammered by every request. The store write is best-effort;
//! a fresh payload is served even when it could not be cached.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use wxcache_core::{
    CacheConfig, TemperatureUnit, WeatherConfig, WeatherError, config::DEFAULT_CACHE_PREFIX,
};

use crate::cache::CacheStore;
use crate::location::LocationKey;
use crate::provider::WeatherSource;
use crate::types::{LookupSource, WeatherResult};

type Flight = Arc<OnceCell<Result<WeatherResult, WeatherError>>>;

/// Releases a caller's hold on a flight, including when the caller is
/// cancelled mid-fetch.
struct FlightGuard<'a> {
    lookup: &'a CachedLookup,
    key: &'a str,
    flight: Flight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.lookup.finish_flight(self.key, &self.flight);
    }
}

/// Tunables for [`CachedLookup`].
#[derive(Debug, Clone)]
pub struct LookupOptions {
    /// Lifetime of a cached payload
    pub ttl: Duration,
    /// Lifetime of a remembered provider failure; zero disables it
    pub negative_ttl: Duration,
    /// Namespace for store keys
    pub prefix: String,
    /// Payloads differ per unit, so the unit is part of the store key
    pub unit: TemperatureUnit,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            negative_ttl: Duration::from_secs(30),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            unit: TemperatureUnit::Auto,
        }
    }
}

impl LookupOptions {
    pub fn from_config(cache: &CacheConfig, weather: &WeatherConfig) -> Self {
        Self {
            ttl: cache.ttl(),
            negative_ttl: cache.negative_ttl(),
            prefix: cache.prefix.clone(),
            unit: weather.temperature_unit,
        }
    }
}

/// Counters describing how lookups were served.
#[derive(Debug, Default)]
pub struct LookupStats {
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_calls: AtomicU64,
    coalesced: AtomicU64,
    negative_hits: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`LookupStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub upstream_calls: u64,
    pub coalesced: u64,
    pub negative_hits: u64,
    pub write_failures: u64,
}

impl LookupStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LookupStatsSnapshot {
        LookupStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Cache-augmented weather lookup.
///
/// The store and provider are injected so tests can substitute fakes.
pub struct CachedLookup {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn WeatherSource>,
    options: LookupOptions,
    in_flight: Mutex<HashMap<String, Flight>>,
    failures: Mutex<HashMap<String, (Instant, WeatherError)>>,
    stats: LookupStats,
}

impl CachedLookup {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn WeatherSource>,
        options: LookupOptions,
    ) -> Self {
        Self {
            store,
            source,
            options,
            in_flight: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            stats: LookupStats::default(),
        }
    }

    pub fn stats(&self) -> LookupStatsSnapshot {
        self.stats.snapshot()
    }

    /// Store key for a location: `{prefix}{unit}:{canonical location}`.
    pub fn store_key(&self, location: &LocationKey) -> String {
        format!(
            "{}{}:{}",
            self.options.prefix,
            self.options.unit.as_str(),
            location.cache_key()
        )
    }

    /// Resolve `location` to a weather payload, from cache when possible.
    pub async fn resolve(&self, location: &LocationKey) -> Result<WeatherResult, WeatherError> {
        let key = self.store_key(location);

        if let Some(body) = self.read_cache(&key).await {
            LookupStats::bump(&self.stats.hits);
            tracing::debug!(key = %key, "Cache hit");
            return Ok(WeatherResult {
                body,
                source: LookupSource::Cache,
            });
        }
        tracing::debug!(key = %key, "Cache miss");

        let (flight, leader) = self.join_flight(&key);
        if !leader {
            LookupStats::bump(&self.stats.coalesced);
            tracing::debug!(key = %key, "Joining in-flight fetch");
        }
        let guard = FlightGuard {
            lookup: self,
            key: &key,
            flight,
        };

        let outcome = guard
            .flight
            .get_or_init(|| self.fetch_through(&key, location))
            .await
            .clone();
        drop(guard);

        match &outcome {
            Ok(result) if result.is_cache_hit() => LookupStats::bump(&self.stats.hits),
            _ => LookupStats::bump(&self.stats.misses),
        }
        outcome
    }

    /// Returns the flight for `key` and whether this caller created it.
    fn join_flight(&self, key: &str) -> (Flight, bool) {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(key) {
            // A completed flight whose owner never cleaned up must not
            // replay an old outcome.
            if !existing.initialized() {
                return (existing.clone(), false);
            }
        }
        let flight: Flight = Arc::new(OnceCell::new());
        in_flight.insert(key.to_string(), flight.clone());
        (flight, true)
    }

    /// Drop the map entry for `flight` once it has completed, or once no
    /// caller is left waiting on it.
    fn finish_flight(&self, key: &str, flight: &Flight) {
        let mut in_flight = self.in_flight.lock();
        let Some(current) = in_flight.get(key) else {
            return;
        };
        if !Arc::ptr_eq(current, flight) {
            return;
        }
        // Clones are only taken under this lock: the map holds one
        // reference and the caller another.
        if flight.initialized() || Arc::strong_count(flight) <= 2 {
            in_flight.remove(key);
        }
    }

    /// Body of a flight. Runs once per flight, on whichever caller is
    /// driving it.
    async fn fetch_through(
        &self,
        key: &str,
        location: &LocationKey,
    ) -> Result<WeatherResult, WeatherError> {
        // A flight that finished just before this one started may already
        // have populated the store.
        if let Some(body) = self.read_cache(key).await {
            return Ok(WeatherResult {
                body,
                source: LookupSource::Cache,
            });
        }

        if let Some(err) = self.recent_failure(key) {
            LookupStats::bump(&self.stats.negative_hits);
            tracing::debug!(key = %key, "Recent provider failure, not retrying yet");
            return Err(err);
        }

        LookupStats::bump(&self.stats.upstream_calls);
        tracing::info!(key = %key, "Fetching weather from provider");

        let body = match self.source.fetch(location).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Weather provider lookup failed");
                self.record_failure(key, &err);
                return Err(err);
            }
        };

        if let Err(e) = self.store.set(key, &body, self.options.ttl).await {
            LookupStats::bump(&self.stats.write_failures);
            let err = WeatherError::from(e);
            tracing::warn!(key = %key, error = %err, "Serving fresh result without caching");
        }

        Ok(WeatherResult {
            body,
            source: LookupSource::Upstream,
        })
    }

    /// Non-empty cached value, or `None`. Read errors count as misses.
    async fn read_cache(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn recent_failure(&self, key: &str) -> Option<WeatherError> {
        let mut failures = self.failures.lock();
        match failures.get(key) {
            None => return None,
            Some((until, err)) if *until > Instant::now() => return Some(err.clone()),
            Some(_) => {}
        }
        failures.remove(key);
        None
    }

    fn record_failure(&self, key: &str, err: &WeatherError) {
        if self.options.negative_ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut failures = self.failures.lock();
        failures.retain(|_, (until, _)| *until > now);
        failures.insert(key.to_string(), (now + self.options.negative_ttl, err.clone()));
    }
}
