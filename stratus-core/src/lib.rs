//! Core library for the `stratus` weather lookup.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers (direct OpenWeatherMap or a key-holding proxy)
//! - The debounced autocomplete orchestrator and its event stream
//! - The bounded recent searches list and its persistence
//! - Pure display formatting of weather data
//!
//! It is used by `stratus-cli` and `stratus-proxy`, but carries no terminal
//! or HTTP server concerns of its own.

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod recent;
pub mod search;
pub mod storage;

pub use config::{Config, SearchSettings};
pub use error::{LocationError, LookupError, StorageError};
pub use events::{EventSink, SearchEvent};
pub use geolocation::{ConfiguredLocation, Geolocator};
pub use model::{Coordinates, Location, UnitPreference, WeatherReport};
pub use provider::{ApiMode, WeatherProvider};
pub use recent::RecencyStore;
pub use search::{KeyCommand, Phase, SearchHandle, SearchOrchestrator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
