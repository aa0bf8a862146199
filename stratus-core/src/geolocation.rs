use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::LocationError, model::Coordinates};

/// Source of the device's position for "use my location".
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Coordinates, LocationError>;
}

/// Reports a fixed position taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    home: Option<Coordinates>,
}

impl ConfiguredLocation {
    pub fn new(home: Option<Coordinates>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Geolocator for ConfiguredLocation {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        self.home.ok_or(LocationError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configured_home_is_reported() {
        let locator = ConfiguredLocation::new(Some(Coordinates::new(59.91, 10.75)));
        assert_eq!(locator.locate().await, Ok(Coordinates::new(59.91, 10.75)));
    }

    #[tokio::test]
    async fn missing_home_is_not_supported() {
        let locator = ConfiguredLocation::default();
        assert_eq!(locator.locate().await, Err(LocationError::NotSupported));
    }
}
