//! Proxy configuration, read from the environment.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use stratus_core::config::{DEFAULT_BASE_URL, DEFAULT_GEO_URL};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8787";

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// OpenWeatherMap key injected into every upstream call. Requests are
    /// answered with 500 while it is unset.
    pub api_key: Option<String>,
    /// Listen address
    pub addr: SocketAddr,
    pub base_url: String,
    pub geo_url: String,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr = var("STRATUS_PROXY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid STRATUS_PROXY_ADDR: {addr}"))?;

        Ok(Self {
            api_key: var("OPENWEATHER_API_KEY"),
            addr,
            base_url: var("OPENWEATHER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            geo_url: var("OPENWEATHER_GEO_URL").unwrap_or_else(|| DEFAULT_GEO_URL.to_string()),
        })
    }
}
