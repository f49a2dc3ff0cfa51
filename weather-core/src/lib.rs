//! Core library for the city weather app.
//!
//! This crate defines:
//! - The weather record model and the error taxonomy shared by every layer
//! - A WeatherAPI.com client that resolves a query into records for each matching city
//! - A single-slot disk cache for the last viewed city
//! - The search state machine a UI drives and observes
//!
//! It is used by `cityweather-cli`, but any front-end can drive [`SearchOrchestrator`].

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod icons;
pub mod model;
pub mod provider;
pub mod search;

pub use cache::{CacheService, DiskCacheService};
pub use config::Config;
pub use error::{AppError, ErrorKind, Location};
pub use format::{TemperatureUnit, format_temperature};
pub use icons::WeatherIcons;
pub use model::{ConditionIcon, WeatherRecord};
pub use provider::{FixtureWeatherService, WeatherApiService, WeatherService};
pub use search::{SearchOrchestrator, SearchState, SubmitOutcome};
