// Geolocation Port

use crate::port::ai_transport::Coordinates;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Location permission denied")]
    PermissionDenied,
}

/// Source of the device's current position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<Coordinates, LocationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::time::Duration;

    /// Always reports the same position
    pub struct FixedLocation(pub Coordinates);

    #[async_trait]
    impl LocationProvider for FixedLocation {
        async fn current_location(&self) -> Result<Coordinates, LocationError> {
            Ok(self.0)
        }
    }

    /// Always fails
    pub struct FailingLocation;

    #[async_trait]
    impl LocationProvider for FailingLocation {
        async fn current_location(&self) -> Result<Coordinates, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    /// Never answers within any reasonable bound
    pub struct HangingLocation;

    #[async_trait]
    impl LocationProvider for HangingLocation {
        async fn current_location(&self) -> Result<Coordinates, LocationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LocationError::Unavailable("gave up".to_string()))
        }
    }
}
