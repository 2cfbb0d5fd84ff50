use anyhow::Result;
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WEATHER_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_NEGATIVE_TTL_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
pub const DEFAULT_CACHE_PREFIX: &str = "wxcache:";

/// Value of `REDIS_URL` that selects the in-process store.
pub const MEMORY_STORE: &str = "memory";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub weather: WeatherConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub listen_addr: SocketAddr,

    /// How long in-flight requests may run after a termination signal
    pub shutdown_grace_secs: u64,
}

/// Temperature unit preference, forwarded to the provider as `unitGroup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Provider `unitGroup` value; `None` leaves the provider default.
    pub fn unit_group(&self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Celsius => Some("metric"),
            Self::Fahrenheit => Some("us"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "celsius" | "metric" | "c" => Ok(Self::Celsius),
            "fahrenheit" | "us" | "f" => Ok(Self::Fahrenheit),
            other => Err(ConfigError::Invalid(format!(
                "WEATHER_UNIT must be auto, celsius or fahrenheit, got: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherConfig {
    /// Provider credential, sent as the `key` query parameter
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Provider endpoint; the location is appended as a path segment
    pub base_url: String,

    pub temperature_unit: TemperatureUnit,

    /// Deadline for a single upstream request
    pub timeout_secs: u64,
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    /// `redis://` URL, bare host (`host` or `host:port`), or `memory`
    #[serde(skip_serializing)]
    pub redis_url: String,

    /// Password applied when `redis_url` is a bare host
    #[serde(skip_serializing)]
    pub redis_password: Option<String>,

    /// Lifetime of a cached payload
    pub ttl_secs: u64,

    /// Lifetime of a recorded upstream failure; 0 disables negative caching
    pub negative_ttl_secs: u64,

    /// Namespace prepended to every store key
    pub prefix: String,
}

/// Which cache store the process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Redis(String),
    Memory,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    /// Resolve `redis_url` into a connectable backend.
    ///
    /// A bare host gets the default port and database 0, with the password
    /// embedded when one is set.
    pub fn backend(&self) -> CacheBackend {
        let raw = self.redis_url.trim();
        if raw.eq_ignore_ascii_case(MEMORY_STORE) {
            return CacheBackend::Memory;
        }
        if raw.contains("://") {
            return CacheBackend::Redis(raw.to_string());
        }

        let host = if raw.contains(':') {
            raw.to_string()
        } else {
            format!("{}:{}", raw, DEFAULT_REDIS_PORT)
        };
        let auth = match self.redis_password.as_deref() {
            Some(pw) if !pw.is_empty() => format!(":{}@", urlencoding::encode(pw)),
            _ => String::new(),
        };
        CacheBackend::Redis(format!("redis://{}{}/0", auth, host))
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// when present.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn from_env_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::from_env()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }
        tracing::debug!("Effective configuration: {}", config.redacted_json());

        Ok((config, validation))
    }

    /// JSON view of the configuration with credentials left out.
    pub fn redacted_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("WEATHER_API_KEY")
            .ok_or_else(|| ConfigError::MissingSetting("WEATHER_API_KEY".into()))?;
        let redis_url = get("REDIS_URL")
            .ok_or_else(|| ConfigError::MissingSetting("REDIS_URL".into()))?;

        let listen_raw = get("WXCACHE_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr = listen_raw.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Invalid(format!("WXCACHE_LISTEN '{listen_raw}': {e}"))
        })?;

        let temperature_unit = match get("WEATHER_UNIT") {
            Some(raw) => raw.parse()?,
            None => TemperatureUnit::default(),
        };

        Ok(Self {
            server: ServerConfig {
                listen_addr,
                shutdown_grace_secs: parse_secs(
                    get("SHUTDOWN_GRACE_SECS"),
                    "SHUTDOWN_GRACE_SECS",
                    DEFAULT_SHUTDOWN_GRACE_SECS,
                )?,
            },
            weather: WeatherConfig {
                api_key,
                base_url: get("WEATHER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.into()),
                temperature_unit,
                timeout_secs: parse_secs(
                    get("WEATHER_TIMEOUT_SECS"),
                    "WEATHER_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?,
            },
            cache: CacheConfig {
                redis_url,
                redis_password: get("REDIS_PASSWORD"),
                ttl_secs: parse_secs(get("CACHE_TTL_SECS"), "CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
                negative_ttl_secs: parse_secs(
                    get("NEGATIVE_TTL_SECS"),
                    "NEGATIVE_TTL_SECS",
                    DEFAULT_NEGATIVE_TTL_SECS,
                )?,
                // An explicitly empty prefix is allowed; `get` filters it out.
                prefix: lookup("CACHE_PREFIX")
                    .map(|v| v.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.into()),
            },
        })
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Upstream timeout must be greater than 0");
        } else if self.weather.timeout_secs > 120 {
            result.add_warning(
                "weather.timeout_secs",
                "Upstream timeout is more than 2 minutes",
            );
        }

        if self.cache.ttl_secs == 0 {
            result.add_error("cache.ttl_secs", "Cache TTL must be greater than 0");
        } else if self.cache.ttl_secs > 7 * 24 * 3600 {
            result.add_warning("cache.ttl_secs", "Cache TTL is more than 7 days");
        }

        if self.cache.negative_ttl_secs == 0 {
            result.add_warning(
                "cache.negative_ttl_secs",
                "Negative caching disabled (0 seconds)",
            );
        } else if self.cache.negative_ttl_secs >= self.cache.ttl_secs {
            result.add_warning(
                "cache.negative_ttl_secs",
                "Negative TTL is not shorter than the cache TTL",
            );
        }

        if self.cache.prefix.is_empty() {
            result.add_warning(
                "cache.prefix",
                "Empty key prefix - keys may collide with other applications",
            );
        }

        if let CacheBackend::Redis(url) = self.cache.backend() {
            match Url::parse(&url) {
                Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "unix" | "redis+unix") => {}
                Ok(url) => result.add_error(
                    "cache.redis_url",
                    format!("URL must use redis or rediss scheme, got: {}", url.scheme()),
                ),
                Err(e) => result.add_error("cache.redis_url", format!("Invalid URL: {}", e)),
            }
        }

        if self.server.shutdown_grace_secs == 0 {
            result.add_warning(
                "server.shutdown_grace_secs",
                "In-flight requests are dropped immediately on shutdown",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.query().is_some() {
                    result.add_error(field_name, "URL must not carry a query string");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }
}

fn parse_secs(
    raw: Option<String>,
    name: &str,
    default: u64,
) -> std::result::Result<u64, ConfigError> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be an integer >= 0"))),
        None => Ok(default),
    }
}
