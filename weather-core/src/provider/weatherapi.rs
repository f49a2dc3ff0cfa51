use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::sync::Arc;
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::{
    app_error,
    config::{Config, DEFAULT_BASE_URL},
    error::AppError,
    model::{CitySearchResult, ConditionIcon, WeatherRecord},
};

use super::WeatherService;

/// Scheme prepended to the provider's protocol-relative icon paths.
const ICON_SCHEME: &str = "https:";
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// WeatherAPI.com client: city search followed by one current-conditions
/// request per matched city.
#[derive(Debug, Clone)]
pub struct WeatherApiService {
    api: Arc<ApiClient>,
    max_concurrent_requests: usize,
}

#[derive(Debug, Clone)]
struct ApiClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiService {
    pub fn new(api_key: String) -> Self {
        Self {
            api: Arc::new(ApiClient {
                api_key,
                base_url: DEFAULT_BASE_URL.to_string(),
                http: Client::new(),
            }),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Construct a client from the API key, endpoint and limits in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.api_key()?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api: Arc::new(ApiClient {
                api_key: api_key.to_owned(),
                base_url: config.base_url.clone(),
                http,
            }),
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut api = ApiClient::clone(&self.api);
        api.base_url = base_url.into();
        self.api = Arc::new(api);
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    #[instrument(skip(self))]
    async fn get_cities(&self, query: &str) -> Result<Vec<CitySearchResult>, AppError> {
        let api = &self.api;
        let cities: Vec<CitySearchResult> = api
            .perform_request("search.json", &[("key", api.api_key.as_str()), ("q", query)])
            .await?;

        if cities.is_empty() {
            debug!(query, "No cities found");
            return Err(app_error!(CityNotFound));
        }
        Ok(cities)
    }

    /// Fetches every city concurrently. The first failure wins and the
    /// remaining requests are aborted when the task set is dropped.
    #[instrument(skip_all, fields(cities = cities.len()))]
    async fn get_details(&self, cities: Vec<CitySearchResult>) -> Result<Vec<WeatherRecord>, AppError> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_requests));
        let mut tasks = JoinSet::new();

        for city in cities {
            let api = Arc::clone(&self.api);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| app_error!(Networking, e))?;
                api.get_detail(city).await
            });
        }

        let mut records = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match settle(joined) {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!(error = %err, pending = tasks.len(), "Detail request failed");
                    return Err(err);
                }
            }
        }

        Ok(records)
    }
}

/// Classified failures pass through untouched; a task that panicked or was
/// cancelled becomes `Networking`.
fn settle(
    joined: Result<Result<WeatherRecord, AppError>, JoinError>,
) -> Result<WeatherRecord, AppError> {
    match joined {
        Ok(result) => result,
        Err(join_err) => {
            error!(error = %join_err, "Detail task did not complete");
            Err(app_error!(Networking, join_err))
        }
    }
}

impl ApiClient {
    async fn get_detail(&self, city: CitySearchResult) -> Result<WeatherRecord, AppError> {
        let response: WaCurrentResponse = self
            .perform_request(
                "current.json",
                &[
                    ("key", self.api_key.as_str()),
                    ("q", city.location_key.as_str()),
                    ("aqi", "no"),
                ],
            )
            .await?;

        let current = response.current;
        let record = WeatherRecord {
            id: city.location_key,
            city_name: city.name,
            temperature_celsius: current.temp_c,
            feels_like_celsius: current.feelslike_c,
            condition_icon: ConditionIcon {
                code: current.condition.code,
                icon_url: current.condition.icon_url()?,
            },
            humidity_percent: current.humidity,
            uv_index: current.uv,
        };

        if !record.is_valid() {
            error!(city = %record.id, "Provider returned out-of-range conditions");
            return Err(app_error!(Networking));
        }
        Ok(record)
    }

    /// GETs `endpoint` under the base URL and decodes a 200 JSON body.
    async fn perform_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let url = Url::parse_with_params(&raw, params).map_err(|e| {
            error!(endpoint = %raw, error = %e, "Unable to produce URL");
            app_error!(UnexpectedNil, e)
        })?;

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| app_error!(Networking, e))?;

        let status = res.status();
        if status != StatusCode::OK {
            error!(%status, endpoint, "Unexpected status code");
            return Err(app_error!(Networking));
        }

        let body = res.bytes().await.map_err(|e| app_error!(Networking, e))?;
        info!(bytes = body.len(), endpoint, "Successfully retrieved response");

        serde_json::from_slice(&body).map_err(|e| {
            debug!(endpoint, error = %e, "Response did not decode");
            app_error!(Networking, e)
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    code: i32,
    icon: String,
}

impl WaCondition {
    fn icon_url(&self) -> Result<String, AppError> {
        let raw = if self.icon.starts_with("//") {
            format!("{ICON_SCHEME}{}", self.icon)
        } else {
            self.icon.clone()
        };
        Url::parse(&raw).map_err(|e| app_error!(Networking, e))?;
        Ok(raw)
    }
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    condition: WaCondition,
    humidity: u8,
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    current: WaCurrent,
}

#[async_trait]
impl WeatherService for WeatherApiService {
    async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(app_error!(CityNotFound));
        }

        let cities = self.get_cities(query).await?;
        self.get_details(cities).await
    }
}
