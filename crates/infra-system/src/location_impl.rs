// Location provider backed by configuration
use async_trait::async_trait;
use nexus_core::port::{Coordinates, LocationError, LocationProvider};

/// Reports a fixed, operator-configured position
///
/// A daemon has no positioning hardware; without configured coordinates every
/// lookup fails and the dispatcher omits the location hint.
pub struct StaticLocationProvider {
    coordinates: Option<Coordinates>,
}

impl StaticLocationProvider {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }

    /// Build from optional latitude/longitude settings; both must be present and in range
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        let coordinates = match (latitude, longitude) {
            (Some(latitude), Some(longitude))
                if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) =>
            {
                Some(Coordinates {
                    latitude,
                    longitude,
                })
            }
            _ => None,
        };
        Self { coordinates }
    }

    pub fn is_configured(&self) -> bool {
        self.coordinates.is_some()
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        self.coordinates
            .ok_or_else(|| LocationError::Unavailable("no location configured".to_string()))
    }
}
