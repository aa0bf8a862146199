use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures reported to proxy callers as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key not configured. Set OPENWEATHER_API_KEY in the proxy environment")]
    MissingKey,

    #[error("{0}")]
    BadRequest(&'static str),

    /// The provider answered with a failure status, which is passed through.
    #[error("API request failed")]
    Upstream(StatusCode),

    #[error("Internal server error")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingKey | ApiError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(status) => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::MissingKey.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::BadRequest("lat/lon required").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Upstream(StatusCode::TOO_MANY_REQUESTS).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn upstream_message_hides_provider_details() {
        assert_eq!(
            ApiError::Upstream(StatusCode::UNAUTHORIZED).to_string(),
            "API request failed"
        );
    }
}
