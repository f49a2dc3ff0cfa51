use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Condition reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionIcon {
    /// Provider condition code, also used for local icon lookup.
    pub code: i32,
    /// Remote image used when no local icon matches `code`.
    pub icon_url: String,
}

/// Current weather snapshot for one city. Temperatures are always Celsius.
///
/// Floating point fields compare and hash by bit pattern, which keeps `Eq`
/// and `Hash` consistent with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    /// Provider location key.
    pub id: String,
    pub city_name: String,
    pub temperature_celsius: f64,
    pub feels_like_celsius: f64,
    pub condition_icon: ConditionIcon,
    pub humidity_percent: u8,
    pub uv_index: f64,
}

impl WeatherRecord {
    /// True when humidity is a percentage, UV is non-negative and every number is finite.
    pub fn is_valid(&self) -> bool {
        self.humidity_percent <= 100
            && self.temperature_celsius.is_finite()
            && self.feels_like_celsius.is_finite()
            && self.uv_index.is_finite()
            && self.uv_index >= 0.0
    }

    /// Chicago sample used by the offline service and tests.
    pub fn example() -> Self {
        Self {
            id: "chicago-usa".to_string(),
            city_name: "Chicago".to_string(),
            temperature_celsius: 22.45758,
            feels_like_celsius: 25.0,
            condition_icon: ConditionIcon {
                code: 1003,
                icon_url: "https://cdn.weatherapi.com/weather/64x64/night/116.png".to_string(),
            },
            humidity_percent: 35,
            uv_index: 3.0,
        }
    }

    fn float_bits(&self) -> (u64, u64, u64) {
        (
            self.temperature_celsius.to_bits(),
            self.feels_like_celsius.to_bits(),
            self.uv_index.to_bits(),
        )
    }
}

impl PartialEq for WeatherRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.city_name == other.city_name
            && self.condition_icon == other.condition_icon
            && self.humidity_percent == other.humidity_percent
            && self.float_bits() == other.float_bits()
    }
}

impl Eq for WeatherRecord {}

impl Hash for WeatherRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.city_name.hash(state);
        self.condition_icon.hash(state);
        self.humidity_percent.hash(state);
        self.float_bits().hash(state);
    }
}

/// A city matched by the search stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct CitySearchResult {
    pub name: String,
    /// Opaque key reused as the query of the detail request.
    #[serde(rename = "url")]
    pub location_key: String,
}
