//! Upstream weather provider client (Visual Crossing timeline API).

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::instrument;
use wxcache_core::{NetworkError, ReqwestErrorExt, TemperatureUnit, WeatherConfig, WeatherError};

use crate::location::LocationKey;

const USER_AGENT: &str = concat!("wxcache/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an upstream error body kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Source of truth for weather payloads.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the raw payload for `location`.
    async fn fetch(&self, location: &LocationKey) -> Result<String, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    unit: TemperatureUnit,
}

impl WeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            unit: config.temperature_unit,
        })
    }

    /// Request URL without the query string; the location is one
    /// percent-encoded path segment.
    pub fn request_url(&self, location: &LocationKey) -> String {
        format!(
            "{}/{}",
            self.base_url,
            urlencoding::encode(location.query_token())
        )
    }

    fn query_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("key", self.api_key.as_str()), ("contentType", "json")];
        if let Some(group) = self.unit.unit_group() {
            params.push(("unitGroup", group));
        }
        params
    }
}

#[async_trait]
impl WeatherSource for WeatherProvider {
    #[instrument(skip(self, location), fields(location = %location), level = "info")]
    async fn fetch(&self, location: &LocationKey) -> Result<String, WeatherError> {
        let url = self.request_url(location);

        let response = self
            .client
            .get(&url)
            .query(&self.query_params())
            .send()
            .await
            // The request URL carries the API key; keep it out of messages.
            .map_err(|e| WeatherError::from_network(e.without_url().into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.trim().chars().take(MAX_ERROR_BODY).collect();
            tracing::debug!(status = %status, "Weather provider returned error status");
            return Err(WeatherError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                message: format!("{}: {}", status, text),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::from_network(e.without_url().into_network_error()))?;

        if body.trim().is_empty() {
            return Err(WeatherError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                message: "provider returned an empty body".into(),
            });
        }

        tracing::debug!(bytes = body.len(), "Weather provider responded");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> WeatherConfig {
        WeatherConfig {
            api_key: "test-key".into(),
            base_url: base_url.into(),
            temperature_unit: TemperatureUnit::Auto,
            timeout_secs: 5,
        }
    }

    fn provider(server: &MockServer) -> WeatherProvider {
        WeatherProvider::new(&config(&format!("{}/timeline/", server.uri()))).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_body() {
        let mock_server = MockServer::start().await;
        let payload = r#"{"resolvedAddress":"London, England, United Kingdom","days":[]}"#;

        Mock::given(method("GET"))
            .and(path("/timeline/London"))
            .and(query_param("key", "test-key"))
            .and(query_param("contentType", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(payload))
            .expect(1)
            .mount(&mock_server)
            .await;

        let location = LocationKey::parse("London").unwrap();
        let body = provider(&mock_server).fetch(&location).await.unwrap();

        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn test_location_is_percent_encoded_path_segment() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/New%20York"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let location = LocationKey::parse("  New   York ").unwrap();
        let provider = provider(&mock_server);
        assert!(provider.request_url(&location).ends_with("/timeline/New%20York"));

        provider.fetch(&location).await.unwrap();
    }

    #[tokio::test]
    async fn test_dotted_location_stays_under_base_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/St.%20Louis"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server);
        provider
            .fetch(&LocationKey::parse("St. Louis").unwrap())
            .await
            .unwrap();

        // Bare dot segments never become a location to send.
        for raw in [".", ".."] {
            assert!(matches!(
                LocationKey::parse(raw),
                Err(WeatherError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unit_group_forwarded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/Paris"))
            .and(query_param("unitGroup", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut cfg = config(&format!("{}/timeline", mock_server.uri()));
        cfg.temperature_unit = TemperatureUnit::Celsius;
        let provider = WeatherProvider::new(&cfg).unwrap();

        provider
            .fetch(&LocationKey::parse("Paris").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_location() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/Nowhereville"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("Bad API Request:Invalid location parameter value."),
            )
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .fetch(&LocationKey::parse("Nowhereville").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.upstream_status(), Some(400));
        assert!(err.is_location_not_found());
        assert!(err.to_string().contains("Invalid location"));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .fetch(&LocationKey::parse("Oslo").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WeatherError::UpstreamUnavailable { status: Some(503), .. }
        ));
        assert!(!err.is_location_not_found());
    }

    #[tokio::test]
    async fn test_empty_body_is_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .fetch(&LocationKey::parse("Lima").unwrap())
            .await;

        assert!(matches!(result, Err(WeatherError::UpstreamUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let mut cfg = config(&mock_server.uri());
        cfg.timeout_secs = 1;
        let provider = WeatherProvider::new(&cfg).unwrap();

        let err = provider
            .fetch(&LocationKey::parse("Cairo").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WeatherError::UpstreamUnavailable { status: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_connection_error_does_not_leak_api_key() {
        // Port 1 is reserved; nothing listens there.
        let provider = WeatherProvider::new(&config("http://127.0.0.1:1")).unwrap();

        let err = provider
            .fetch(&LocationKey::parse("Berlin").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.upstream_status(), None);
        assert!(!err.to_string().contains("test-key"));
    }
}
