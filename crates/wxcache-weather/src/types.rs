/// Where a lookup's payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Upstream,
}

impl LookupSource {
    /// Value for the `X-Cache` response header
    pub fn cache_status(&self) -> &'static str {
        match self {
            Self::Cache => "HIT",
            Self::Upstream => "MISS",
        }
    }
}

/// Weather payload returned to the caller.
///
/// `body` is the provider's response exactly as received (or as stored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherResult {
    pub body: String,
    pub source: LookupSource,
}

impl WeatherResult {
    pub fn is_cache_hit(&self) -> bool {
        self.source == LookupSource::Cache
    }
}
