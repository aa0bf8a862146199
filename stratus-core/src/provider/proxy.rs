use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use crate::{
    error::LookupError,
    model::{Coordinates, ForecastSeries, Location, WeatherSnapshot},
    provider::{
        openweather::{OwCurrentResponse, OwForecastResponse, OwPlace},
        read_json,
    },
};

use super::WeatherProvider;

/// Operations understood by `stratus-proxy` on its `/api` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyOperation {
    Search,
    Current,
    Forecast,
}

impl ProxyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyOperation::Search => "search",
            ProxyOperation::Current => "current",
            ProxyOperation::Forecast => "forecast",
        }
    }

    /// Accepts the canonical names plus the older `geocode`/`weather` aliases.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "search" | "geocode" => Some(ProxyOperation::Search),
            "current" | "weather" => Some(ProxyOperation::Current),
            "forecast" => Some(ProxyOperation::Forecast),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProxyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Talks to a `stratus-proxy` deployment; the proxy injects the API key and
/// returns provider JSON verbatim.
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    proxy_url: String,
    http: Client,
}

impl ProxyProvider {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn call(
        &self,
        operation: ProxyOperation,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, LookupError> {
        let url = format!("{}/api", self.proxy_url);

        let res = self
            .http
            .get(url)
            .query(&[("endpoint", operation.as_str())])
            .query(params)
            .send()
            .await?;

        Ok(res)
    }
}

#[async_trait]
impl WeatherProvider for ProxyProvider {
    #[instrument(skip(self), level = "debug")]
    async fn geocode(&self, query: &str, limit: u32) -> Result<Vec<Location>, LookupError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let res = self
            .call(
                ProxyOperation::Search,
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        let places: Vec<OwPlace> = read_json(res, "proxy search").await?;
        Ok(places.into_iter().map(Location::from).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, LookupError> {
        let res = self
            .call(
                ProxyOperation::Current,
                &[("lat", at.lat.to_string()), ("lon", at.lon.to_string())],
            )
            .await?;

        let parsed: OwCurrentResponse = read_json(res, "proxy current").await?;
        Ok(parsed.into())
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast(&self, at: Coordinates) -> Result<ForecastSeries, LookupError> {
        let res = self
            .call(
                ProxyOperation::Forecast,
                &[("lat", at.lat.to_string()), ("lon", at.lon.to_string())],
            )
            .await?;

        let parsed: OwForecastResponse = read_json(res, "proxy forecast").await?;
        Ok(parsed.into())
    }
}
