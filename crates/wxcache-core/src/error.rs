//! Centralized error types for wxcache.
//!
//! This module provides a typed error hierarchy that:
//! - Separates caller mistakes from upstream and cache failures
//! - Provides short plain-text messages safe to return over HTTP
//! - Preserves full error context for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Startup and wiring code converts everything into this type; the request
/// path works with [`WeatherError`] directly.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a short message suitable for returning to a caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Cache(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "Unable to reach the weather service.",
            NetworkError::Timeout => "The weather service timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The weather service is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Cache store errors (connection, GET, SET).
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Cache read failed: {0}")]
    ReadFailed(String),

    #[error("Cache write failed: {0}")]
    WriteFailed(String),
}

impl CacheError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CacheError::ConnectionFailed(_) => "Cache store unavailable.",
            CacheError::ReadFailed(_) | CacheError::WriteFailed(_) => "Cache operation failed.",
        }
    }
}

/// Errors on the request path of a weather lookup.
///
/// `Clone` so a single in-flight fetch can hand its outcome to every caller
/// waiting on the same location.
#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    #[error("Invalid location: {0}")]
    InvalidInput(String),

    #[error("Weather provider unavailable: {message}")]
    UpstreamUnavailable { status: Option<u16>, message: String },

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache write failed: {0}")]
    CacheWriteFailed(String),
}

impl WeatherError {
    /// Build an upstream failure from a transport-level error.
    pub fn from_network(err: NetworkError) -> Self {
        let status = match &err {
            NetworkError::ServerError { status, .. } => Some(*status),
            _ => None,
        };
        WeatherError::UpstreamUnavailable {
            status,
            message: err.to_string(),
        }
    }

    /// HTTP status the upstream answered with, if it answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            WeatherError::UpstreamUnavailable { status, .. } => *status,
            _ => None,
        }
    }

    /// True when the upstream rejected the location itself (400/404) rather
    /// than failing to serve it.
    pub fn is_location_not_found(&self) -> bool {
        matches!(self.upstream_status(), Some(400) | Some(404))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::InvalidInput(_) => "Please enter a valid city name or ZIP code.",
            WeatherError::UpstreamUnavailable { .. } if self.is_location_not_found() => {
                "Location not found."
            }
            WeatherError::UpstreamUnavailable { .. } => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::CacheUnavailable(_) => "Weather cache unavailable.",
            WeatherError::CacheWriteFailed(_) => "Weather data may not be cached.",
        }
    }
}

impl From<CacheError> for WeatherError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::WriteFailed(msg) => WeatherError::CacheWriteFailed(msg),
            other => WeatherError::CacheUnavailable(other.to_string()),
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() || self.is_body() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
