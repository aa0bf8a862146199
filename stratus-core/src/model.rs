use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A geocoded place. Two locations are the same place when their
/// coordinates are equal, regardless of name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    pub fn same_place(&self, other: &Location) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }

    /// "London, England, GB", or "Paris, FR" when there is no state.
    pub fn display_name(&self) -> String {
        if self.state.is_empty() {
            format!("{}, {}", self.name, self.country)
        } else {
            format!("{}, {}, {}", self.name, self.state, self.country)
        }
    }
}

/// Temperature/wind display preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    #[default]
    Imperial,
    Metric,
}

impl UnitPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitPreference::Imperial => "imperial",
            UnitPreference::Metric => "metric",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            UnitPreference::Imperial => "°F",
            UnitPreference::Metric => "°C",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UnitPreference::Imperial => UnitPreference::Metric,
            UnitPreference::Metric => UnitPreference::Imperial,
        }
    }
}

impl std::fmt::Display for UnitPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitPreference {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "imperial" | "f" | "fahrenheit" => Ok(UnitPreference::Imperial),
            "metric" | "c" | "celsius" => Ok(UnitPreference::Metric),
            _ => Err(anyhow::anyhow!(
                "Unknown unit '{value}'. Supported units: imperial, metric."
            )),
        }
    }
}

/// Short weather condition as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            main: "Unknown".to_string(),
            description: "Unknown".to_string(),
            icon: String::new(),
        }
    }
}

/// Current conditions at a place. Temperatures are Kelvin, wind is m/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub name: String,
    pub country: String,
    pub observed_at: DateTime<Utc>,
    /// Shift from UTC in seconds.
    pub timezone_offset: i32,
    pub temp_k: f64,
    pub feels_like_k: f64,
    pub temp_min_k: f64,
    pub temp_max_k: f64,
    pub humidity_pct: u8,
    pub condition: Condition,
    pub wind_speed_mps: f64,
    pub wind_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub temp_k: f64,
    pub temp_min_k: f64,
    pub temp_max_k: f64,
    pub condition: Condition,
    /// Probability of precipitation, 0..=1.
    pub pop: f64,
}

/// Multi-point forecast, ordered by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city_name: String,
    pub country: String,
    pub timezone_offset: i32,
    pub samples: Vec<ForecastSample>,
}

/// Current conditions and forecast fetched together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: WeatherSnapshot,
    pub forecast: ForecastSeries,
}
