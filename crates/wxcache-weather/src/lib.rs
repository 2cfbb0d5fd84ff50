//! Weather lookup for wxcache
//!
//! Normalizes location input, fetches payloads from the Visual Crossing
//! timeline API, and caches them in Redis (or in memory) with a fixed TTL.

pub mod cache;
pub mod location;
pub mod lookup;
pub mod provider;
pub mod types;

pub use cache::{CacheStore, InMemoryStore, RedisStore};
pub use location::{escape_html, LocationKey, MAX_LOCATION_LEN};
pub use lookup::{CachedLookup, LookupOptions, LookupStatsSnapshot};
pub use provider::{WeatherProvider, WeatherSource};
pub use types::{LookupSource, WeatherResult};
