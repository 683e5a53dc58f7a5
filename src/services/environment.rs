//! Device location and site weather, behind an injectable provider.

use crate::models::project_file::{GpsFix, WeatherSnapshot};
use async_trait::async_trait;
use thiserror::Error;

/// Central London, used when no device location is available.
pub const DEFAULT_LOCATION: GpsFix = GpsFix {
    latitude: 51.5074,
    longitude: -0.1278,
    accuracy: None,
};

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("weather unavailable: {0}")]
    WeatherUnavailable(String),
}

#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    async fn current_location(&self) -> Result<GpsFix, EnvironmentError>;

    async fn current_weather(&self, at: &GpsFix) -> Result<WeatherSnapshot, EnvironmentError>;
}

/// Provider with no device behind it: it never knows the location and
/// reports a fixed weather snapshot.
#[derive(Clone, Debug)]
pub struct StaticEnvironment {
    weather: WeatherSnapshot,
}

impl StaticEnvironment {
    pub fn new(weather: WeatherSnapshot) -> Self {
        Self { weather }
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::new(WeatherSnapshot {
            condition: "Partly Cloudy".into(),
            temperature: 18.0,
            humidity: 65.0,
            wind_speed: 12.0,
        })
    }
}

#[async_trait]
impl EnvironmentProvider for StaticEnvironment {
    async fn current_location(&self) -> Result<GpsFix, EnvironmentError> {
        Err(EnvironmentError::LocationUnavailable(
            "no positioning source on the server".into(),
        ))
    }

    async fn current_weather(&self, at: &GpsFix) -> Result<WeatherSnapshot, EnvironmentError> {
        if !(-90.0..=90.0).contains(&at.latitude) || !(-180.0..=180.0).contains(&at.longitude) {
            return Err(EnvironmentError::WeatherUnavailable(format!(
                "no conditions for ({}, {})",
                at.latitude, at.longitude
            )));
        }
        Ok(self.weather.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_reports_weather_but_no_location() {
        let env = StaticEnvironment::default();
        assert!(matches!(
            env.current_location().await,
            Err(EnvironmentError::LocationUnavailable(_))
        ));
        let weather = env.current_weather(&DEFAULT_LOCATION).await.unwrap();
        assert_eq!(weather.condition, "Partly Cloudy");
    }

    #[tokio::test]
    async fn static_provider_refuses_impossible_coordinates() {
        let env = StaticEnvironment::default();
        let nowhere = GpsFix {
            latitude: 123.0,
            longitude: 0.0,
            accuracy: None,
        };
        assert!(matches!(
            env.current_weather(&nowhere).await,
            Err(EnvironmentError::WeatherUnavailable(_))
        ));
    }
}
