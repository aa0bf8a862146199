use crate::{
    Config,
    error::LookupError,
    model::{Coordinates, ForecastSeries, Location, WeatherReport, WeatherSnapshot},
    provider::{openweather::OpenWeatherProvider, proxy::ProxyProvider},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug};

pub mod openweather;
pub mod proxy;

/// How the client reaches the weather provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMode {
    /// Straight to OpenWeatherMap with a local API key.
    Direct,
    /// Through `stratus-proxy`, which holds the key.
    Proxy,
}

impl ApiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMode::Direct => "direct",
            ApiMode::Proxy => "proxy",
        }
    }

    pub const fn all() -> &'static [ApiMode] {
        &[ApiMode::Direct, ApiMode::Proxy]
    }
}

impl std::fmt::Display for ApiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ApiMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "direct" => Ok(ApiMode::Direct),
            "proxy" => Ok(ApiMode::Proxy),
            _ => Err(anyhow::anyhow!(
                "Unknown mode '{value}'. Supported modes: direct, proxy."
            )),
        }
    }
}

/// Remote lookups against a weather/geocoding provider.
///
/// Every operation makes a single attempt. HTTP 401 maps to
/// [`LookupError::InvalidCredentials`], 429 to [`LookupError::RateLimited`],
/// any other failure status or transport error to [`LookupError::Network`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Resolve free text to at most `limit` places. An empty query returns
    /// an empty list without touching the network.
    async fn geocode(&self, query: &str, limit: u32) -> Result<Vec<Location>, LookupError>;

    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, LookupError>;

    async fn forecast(&self, at: Coordinates) -> Result<ForecastSeries, LookupError>;

    /// Current conditions and forecast, requested concurrently. Fails with
    /// the first error; a half-successful pair is discarded.
    async fn weather_by_coords(&self, at: Coordinates) -> Result<WeatherReport, LookupError> {
        let (current, forecast) = tokio::try_join!(self.current_weather(at), self.forecast(at))?;
        Ok(WeatherReport { current, forecast })
    }
}

/// Construct a provider from config and explicit ApiMode.
pub fn provider_from_config(
    mode: ApiMode,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let boxed: Box<dyn WeatherProvider> = match mode {
        ApiMode::Direct => {
            let api_key = config.api_key().ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured for mode '{mode}'.\n\
                         Hint: run `stratus configure {mode}` and enter your API key."
                )
            })?;
            Box::new(OpenWeatherProvider::with_urls(
                api_key.to_owned(),
                config.base_url(),
                config.geo_url(),
            ))
        }
        ApiMode::Proxy => {
            let proxy_url = config.proxy_url().ok_or_else(|| {
                anyhow::anyhow!(
                    "No proxy URL configured for mode '{mode}'.\n\
                         Hint: run `stratus configure {mode}` and enter the proxy address."
                )
            })?;
            Box::new(ProxyProvider::new(proxy_url))
        }
    };

    Ok(boxed)
}

/// Construct the provider for the configured `mode`.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let mode = config.mode()?;
    provider_from_config(mode, config)
}

/// Map an HTTP status onto the lookup error taxonomy.
pub(crate) fn check_status(status: StatusCode, body: &str) -> Result<(), LookupError> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(LookupError::InvalidCredentials),
        StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited),
        _ => Err(LookupError::Network(format!(
            "request failed with status {}: {}",
            status,
            truncate_body(body),
        ))),
    }
}

/// Read the body, classify the status, then decode JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, LookupError> {
    let status = response.status();
    let body = response.text().await?;

    check_status(status, &body)?;

    serde_json::from_str(&body)
        .map_err(|e| LookupError::Unexpected(format!("Failed to parse {what} JSON: {e}")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
