pub mod config;
pub mod error;

pub use config::{
    CacheBackend, CacheConfig, Config, ServerConfig, TemperatureUnit, ValidationResult,
    WeatherConfig,
};
pub use error::{
    AppError, CacheError, ConfigError, NetworkError, ReqwestErrorExt, WeatherError,
};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` overrides the default `info` filter and
/// may come from a `.env` file in the working directory.
pub fn init() -> Result<()> {
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    tracing::info!("wxcache core initialized");
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_log_level_reaches_filter() {
        let dir = std::env::temp_dir().join(format!("wxcache-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(&path, "RUST_LOG=wxcache=trace\n").unwrap();

        std::env::remove_var("RUST_LOG");
        assert_eq!(env_filter().to_string(), "info");

        dotenvy::from_path(&path).unwrap();
        assert_eq!(env_filter().to_string(), "wxcache=trace");

        std::env::remove_var("RUST_LOG");
        std::fs::remove_dir_all(&dir).ok();
    }
}
