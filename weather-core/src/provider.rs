use crate::{error::AppError, model::WeatherRecord};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod fixture;
pub mod weatherapi;

pub use fixture::FixtureWeatherService;
pub use weatherapi::WeatherApiService;

/// Resolves a free-text query into weather records for every matching city.
#[async_trait]
pub trait WeatherService: Send + Sync + Debug {
    /// Either every matching city's record or the first failure; never a partial list.
    async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, AppError>;
}
