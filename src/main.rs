use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use wxcache_core::{AppError, CacheBackend, Config, WeatherError};
use wxcache_server::{shutdown_signal, WeatherServer};
use wxcache_weather::{
    CacheStore, CachedLookup, InMemoryStore, LookupOptions, RedisStore, WeatherProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    wxcache_core::init()?;

    if let Err(e) = run().await {
        tracing::error!(error = %e, "{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), AppError> {
    let (config, _validation) = Config::from_env_validated()?;
    tracing::info!(
        listen = %config.server.listen_addr,
        unit = config.weather.temperature_unit.as_str(),
        ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    let store: Arc<dyn CacheStore> = match config.cache.backend() {
        CacheBackend::Redis(url) => {
            let store = RedisStore::connect(&url)
                .await
                .map_err(WeatherError::from)?;
            tracing::info!("Connected to Redis");
            Arc::new(store)
        }
        CacheBackend::Memory => {
            tracing::warn!("Using in-process cache; entries are lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let provider = WeatherProvider::new(&config.weather)?;
    let lookup = Arc::new(CachedLookup::new(
        store,
        Arc::new(provider),
        LookupOptions::from_config(&config.cache, &config.weather),
    ));

    let server = WeatherServer::bind(
        config.server.listen_addr,
        lookup.clone(),
        Duration::from_secs(config.server.shutdown_grace_secs),
    )?;
    server.run_until(shutdown_signal()).await?;

    let stats = lookup.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        upstream_calls = stats.upstream_calls,
        coalesced = stats.coalesced,
        "Lookup totals"
    );

    Ok(())
}
