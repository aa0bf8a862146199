//! Error taxonomy shared by the lookup client, the orchestrator and storage.

use thiserror::Error;

/// Why the device position could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    Denied,

    #[error("Location service not supported")]
    NotSupported,

    #[error("Location lookup failed: {0}")]
    Failed(String),
}

/// Failures surfaced by lookups and weather fetches.
///
/// Holds only owned strings so it can be cloned into orchestrator state and
/// events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Provider rejected the API credentials")]
    InvalidCredentials,

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(#[from] LocationError),

    #[error("Unexpected provider response: {0}")]
    Unexpected(String),
}

impl LookupError {
    /// User-friendly message for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid API key. Please check your configuration.",
            Self::RateLimited => "Too many requests. Please try again in a moment.",
            Self::Network(_) => "Unable to connect. Please check your internet connection.",
            Self::LocationUnavailable(LocationError::Denied) => {
                "Location access denied. Please search for a city instead."
            }
            Self::LocationUnavailable(LocationError::NotSupported) => {
                "Geolocation is not supported on this device."
            }
            Self::LocationUnavailable(LocationError::Failed(_)) => {
                "Unable to get your location. Please try again."
            }
            Self::Unexpected(_) => "An unexpected error occurred.",
        }
    }

    /// Whether the presentation layer should offer a retry.
    pub fn offers_retry(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Network(_))
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Persistence failures. Absorbed at the recency store boundary.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
