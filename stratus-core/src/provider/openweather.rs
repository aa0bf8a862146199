use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    config::{DEFAULT_BASE_URL, DEFAULT_GEO_URL},
    error::LookupError,
    model::{
        Condition, Coordinates, ForecastSample, ForecastSeries, Location, WeatherSnapshot,
    },
    provider::read_json,
};

use super::WeatherProvider;

/// Talks to OpenWeatherMap directly with a local API key.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    geo_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_urls(api_key, DEFAULT_BASE_URL, DEFAULT_GEO_URL)
    }

    pub fn with_urls(api_key: String, base_url: &str, geo_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            geo_url: geo_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn get_by_coords(
        &self,
        path: &str,
        at: Coordinates,
    ) -> Result<reqwest::Response, LookupError> {
        let url = format!("{}/data/2.5/{}", self.base_url, path);

        let res = self
            .http
            .get(url)
            .query(&[
                ("lat", at.lat.to_string().as_str()),
                ("lon", at.lon.to_string().as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await?;

        Ok(res)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn geocode(&self, query: &str, limit: u32) -> Result<Vec<Location>, LookupError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/direct", self.geo_url);

        let res = self
            .http
            .get(url)
            .query(&[
                ("q", query),
                ("limit", limit.to_string().as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let places: Vec<OwPlace> = read_json(res, "OpenWeather geocoding").await?;
        Ok(places.into_iter().map(Location::from).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, LookupError> {
        let res = self.get_by_coords("weather", at).await?;
        let parsed: OwCurrentResponse = read_json(res, "OpenWeather current").await?;
        Ok(parsed.into())
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast(&self, at: Coordinates) -> Result<ForecastSeries, LookupError> {
        let res = self.get_by_coords("forecast", at).await?;
        let parsed: OwForecastResponse = read_json(res, "OpenWeather forecast").await?;
        Ok(parsed.into())
    }
}

// Wire types shared with the proxy client, which receives the same payloads.

#[derive(Debug, Deserialize)]
pub(crate) struct OwPlace {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
}

impl From<OwPlace> for Location {
    fn from(p: OwPlace) -> Self {
        Location {
            name: p.name,
            state: p.state.unwrap_or_default(),
            country: p.country,
            lat: p.lat,
            lon: p.lon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
    #[serde(default)]
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwCurrentResponse {
    name: String,
    dt: i64,
    #[serde(default)]
    timezone: i32,
    #[serde(default)]
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn first_condition(weather: Vec<OwWeather>) -> Condition {
    weather
        .into_iter()
        .next()
        .map(|w| Condition {
            main: w.main,
            description: w.description,
            icon: w.icon,
        })
        .unwrap_or_default()
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(parsed: OwCurrentResponse) -> Self {
        let temp = parsed.main.temp;
        WeatherSnapshot {
            name: parsed.name,
            country: parsed.sys.country,
            observed_at: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
            timezone_offset: parsed.timezone,
            temp_k: temp,
            feels_like_k: parsed.main.feels_like.unwrap_or(temp),
            temp_min_k: parsed.main.temp_min.unwrap_or(temp),
            temp_max_k: parsed.main.temp_max.unwrap_or(temp),
            humidity_pct: parsed.main.humidity,
            condition: first_condition(parsed.weather),
            wind_speed_mps: parsed.wind.speed,
            wind_deg: parsed.wind.deg,
        }
    }
}

impl From<OwForecastResponse> for ForecastSeries {
    fn from(parsed: OwForecastResponse) -> Self {
        let samples = parsed
            .list
            .into_iter()
            .filter_map(|entry| {
                let time = unix_to_utc(entry.dt)?;
                let temp = entry.main.temp;
                Some(ForecastSample {
                    time,
                    temp_k: temp,
                    temp_min_k: entry.main.temp_min.unwrap_or(temp),
                    temp_max_k: entry.main.temp_max.unwrap_or(temp),
                    condition: first_condition(entry.weather),
                    pop: entry.pop,
                })
            })
            .collect();

        ForecastSeries {
            city_name: parsed.city.name,
            country: parsed.city.country,
            timezone_offset: parsed.city.timezone,
            samples,
        }
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}
