use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::{app_error, error::AppError, model::WeatherRecord};

use super::WeatherService;

/// Network-free service for demos and tests.
///
/// After `delay`, the query `networking` fails with a networking error, `city`
/// fails with city-not-found, and anything else yields the Chicago example.
#[derive(Debug, Clone, Default)]
pub struct FixtureWeatherService {
    delay: Duration,
}

impl FixtureWeatherService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl WeatherService for FixtureWeatherService {
    async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, AppError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match query.trim() {
            "networking" => Err(app_error!(Networking)),
            "city" => Err(app_error!(CityNotFound)),
            other => {
                debug!(query = other, "serving fixture record");
                Ok(vec![WeatherRecord::example()])
            }
        }
    }
}
