//! The `/api` forwarding route and its single-purpose aliases.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{Method, header},
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Client;
use serde::Deserialize;
use stratus_core::provider::proxy::ProxyOperation;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::{config::ProxyConfig, error::ApiError};

const DEFAULT_LIMIT: &str = "5";

/// Shared application state
#[derive(Debug)]
pub struct ProxyState {
    api_key: Option<String>,
    base_url: String,
    geo_url: String,
    http: Client,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            geo_url: config.geo_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiParams {
    endpoint: Option<String>,
    q: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
    limit: Option<String>,
}

/// Create the router with permissive CORS and request tracing.
pub fn create_router(state: Arc<ProxyState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api", get(forward))
        .route("/geocode", get(geocode))
        .route("/weather", get(weather))
        .route("/forecast", get(forecast))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    Query(params): Query<ApiParams>,
) -> Result<Response, ApiError> {
    state.api_key.as_deref().ok_or(ApiError::MissingKey)?;
    let operation = present(&params.endpoint)
        .and_then(ProxyOperation::parse)
        .ok_or(ApiError::BadRequest(
            "Invalid endpoint. Use: search, current, forecast",
        ))?;

    relay(&state, operation, &params).await
}

async fn geocode(
    State(state): State<Arc<ProxyState>>,
    Query(params): Query<ApiParams>,
) -> Result<Response, ApiError> {
    relay(&state, ProxyOperation::Search, &params).await
}

async fn weather(
    State(state): State<Arc<ProxyState>>,
    Query(params): Query<ApiParams>,
) -> Result<Response, ApiError> {
    relay(&state, ProxyOperation::Current, &params).await
}

async fn forecast(
    State(state): State<Arc<ProxyState>>,
    Query(params): Query<ApiParams>,
) -> Result<Response, ApiError> {
    relay(&state, ProxyOperation::Forecast, &params).await
}

/// Inject the key, call the provider, and hand its JSON back untouched.
async fn relay(
    state: &ProxyState,
    operation: ProxyOperation,
    params: &ApiParams,
) -> Result<Response, ApiError> {
    let api_key = state.api_key.as_deref().ok_or(ApiError::MissingKey)?;

    let request = match operation {
        ProxyOperation::Search => {
            let q = present(&params.q).ok_or(ApiError::BadRequest("Query \"q\" required"))?;
            let limit = present(&params.limit).unwrap_or(DEFAULT_LIMIT);
            state
                .http
                .get(format!("{}/direct", state.geo_url))
                .query(&[("q", q), ("limit", limit), ("appid", api_key)])
        }
        ProxyOperation::Current | ProxyOperation::Forecast => {
            let (lat, lon) = present(&params.lat)
                .zip(present(&params.lon))
                .ok_or(ApiError::BadRequest("lat/lon required"))?;
            let path = match operation {
                ProxyOperation::Current => "weather",
                _ => "forecast",
            };
            state
                .http
                .get(format!("{}/data/2.5/{path}", state.base_url))
                .query(&[("lat", lat), ("lon", lon), ("appid", api_key)])
        }
    };

    debug!(%operation, "Forwarding to provider");
    let upstream = request
        .send()
        .await
        .inspect_err(|e| warn!(%operation, error = %e, "Provider unreachable"))?;

    let status = upstream.status();
    if !status.is_success() {
        warn!(%operation, %status, "Provider request failed");
        return Err(ApiError::Upstream(status));
    }

    let body = upstream.bytes().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
