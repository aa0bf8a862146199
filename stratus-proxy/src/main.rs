//! stratus-proxy - keeps the OpenWeatherMap key off client machines.
//!
//! Serves `GET /api?endpoint=search|current|forecast`, plus the `/geocode`,
//! `/weather` and `/forecast` shorthands, and forwards each call to the
//! provider with the key from `OPENWEATHER_API_KEY`.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod error;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("stratus_proxy=info".parse()?))
        .init();

    info!("stratus-proxy v{}", env!("CARGO_PKG_VERSION"));

    let config = config::ProxyConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("OPENWEATHER_API_KEY is not set; every request will fail until it is");
    }

    let app = routes::create_router(Arc::new(routes::ProxyState::new(&config)));
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
