use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::model::{Coordinates, UnitPreference};
use crate::provider::ApiMode;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_GEO_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Tunables for the search pipeline. Fixed once an orchestrator is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Quiet period after the last keystroke before a lookup fires.
    pub debounce_ms: u64,
    /// Queries shorter than this (in characters) never hit the network.
    pub min_search_chars: usize,
    /// Result count limit passed to the geocoder.
    pub max_results: u32,
    /// Capacity of the recent searches list.
    pub max_recent: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_search_chars: 2,
            max_results: 5,
            max_recent: 5,
        }
    }
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// mode = "direct"
/// api_key = "..."
/// units = "metric"
///
/// [home]
/// lat = 51.5074
/// lon = -0.1278
///
/// [search]
/// debounce_ms = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// "direct" or "proxy".
    pub mode: Option<String>,

    /// OpenWeatherMap key, used in direct mode only.
    pub api_key: Option<String>,

    /// Base URL of a running `stratus-proxy`, used in proxy mode only.
    pub proxy_url: Option<String>,

    pub base_url: Option<String>,
    pub geo_url: Option<String>,

    pub units: UnitPreference,

    /// Coordinates reported as "my location".
    pub home: Option<Coordinates>,

    pub search: SearchSettings,
}

impl Config {
    /// Return the configured mode as a strongly-typed ApiMode.
    pub fn mode(&self) -> Result<ApiMode> {
        let s = self.mode.as_ref().ok_or_else(|| {
            anyhow!(
                "No API mode configured.\n\
                 Hint: run `stratus configure <mode>` (e.g. `stratus configure direct`) first."
            )
        })?;

        ApiMode::try_from(s.as_str())
    }

    pub fn set_mode(&mut self, mode: ApiMode) {
        self.mode = Some(mode.as_str().to_string());
    }

    /// Store the API key; selects direct mode when no mode is set yet.
    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);

        if self.mode.is_none() {
            self.set_mode(ApiMode::Direct);
        }
    }

    /// Store the proxy URL; selects proxy mode when no mode is set yet.
    pub fn set_proxy_url(&mut self, proxy_url: String) {
        self.proxy_url = Some(proxy_url.trim_end_matches('/').to_string());

        if self.mode.is_none() {
            self.set_mode(ApiMode::Proxy);
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn geo_url(&self) -> &str {
        self.geo_url.as_deref().unwrap_or(DEFAULT_GEO_URL)
    }

    pub fn is_mode_configured(&self, mode: ApiMode) -> bool {
        match mode {
            ApiMode::Direct => self.api_key().is_some(),
            ApiMode::Proxy => self.proxy_url().is_some(),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "stratus", "stratus")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding persisted state such as recent searches.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }
}
