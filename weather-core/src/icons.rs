use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tracing::warn;

use crate::model::ConditionIcon;

#[derive(Debug, Deserialize)]
struct Combination {
    code: i32,
    #[serde(rename = "icon-name")]
    icon_name: String,
}

/// Maps provider condition codes to locally bundled icon names.
#[derive(Debug, Clone, Default)]
pub struct WeatherIcons {
    combinations: HashMap<i32, String>,
}

impl WeatherIcons {
    /// Loads a JSON list of `{ "code", "icon-name" }` pairs. Anything that
    /// cannot be read or decoded gives an empty catalog.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read icon catalog");
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Vec<Combination>>(json) {
            Ok(list) => Self {
                combinations: list.into_iter().map(|c| (c.code, c.icon_name)).collect(),
            },
            Err(e) => {
                warn!(error = %e, "Icon catalog did not decode");
                Self::default()
            }
        }
    }

    pub fn image_name(&self, icon: &ConditionIcon) -> Option<&str> {
        self.combinations.get(&icon.code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon(code: i32) -> ConditionIcon {
        ConditionIcon { code, icon_url: "https://cdn.weatherapi.com/x.png".into() }
    }

    #[test]
    fn looks_up_by_code() {
        let icons = WeatherIcons::from_json(
            r#"[{ "code": 1000, "icon-name": "sun" }, { "code": 1003, "icon-name": "cloud_sun" }]"#,
        );

        assert_eq!(icons.image_name(&icon(1003)), Some("cloud_sun"));
        assert_eq!(icons.image_name(&icon(1195)), None);
    }

    #[test]
    fn malformed_catalog_is_empty() {
        let icons = WeatherIcons::from_json(r#"{ "code": 1000 }"#);
        assert!(icons.is_empty());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let icons = WeatherIcons::load(&dir.path().join("weather_images.json"));
        assert!(icons.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather_images.json");
        fs::write(&path, r#"[{ "code": 1003, "icon-name": "cloud_sun" }]"#).unwrap();

        let icons = WeatherIcons::load(&path);
        assert_eq!(icons.image_name(&icon(1003)), Some("cloud_sun"));
    }
}
