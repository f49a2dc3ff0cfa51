use serde::{Deserialize, Serialize};

/// Unit temperatures are shown in. Records always store Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Whole degrees with a trailing degree sign, e.g. `22°`.
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    let rounded = unit.convert(celsius).round();
    // avoid "-0°"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.0}°")
}
