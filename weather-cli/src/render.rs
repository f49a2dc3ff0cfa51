use cityweather_core::{
    ConditionIcon, SearchState, TemperatureUnit, WeatherIcons, WeatherRecord, format_temperature,
};

/// Text for one frame of the search screen.
pub fn render(state: &SearchState, unit: TemperatureUnit, icons: &WeatherIcons) -> String {
    match state {
        SearchState::Idle => "No City Selected\nPlease Search For A City".to_string(),
        SearchState::Searching => "Searching…".to_string(),
        SearchState::Results(records) if records.is_empty() => "No results".to_string(),
        SearchState::Results(records) => records
            .iter()
            .map(|record| result_line(record, unit, icons))
            .collect::<Vec<_>>()
            .join("\n"),
        SearchState::Detail(record) => detail(record, unit, icons),
        SearchState::Error(err) => format!("Whoops!\n{}", err.user_description()),
    }
}

/// Label used in the city picker.
pub fn result_line(record: &WeatherRecord, unit: TemperatureUnit, icons: &WeatherIcons) -> String {
    format!(
        "{:<24} {:>5}  {}",
        record.city_name,
        format_temperature(record.temperature_celsius, unit),
        icon_label(&record.condition_icon, icons),
    )
}

fn detail(record: &WeatherRecord, unit: TemperatureUnit, icons: &WeatherIcons) -> String {
    [
        record.city_name.clone(),
        format!(
            "{}  {}",
            format_temperature(record.temperature_celsius, unit),
            icon_label(&record.condition_icon, icons)
        ),
        format!("Humidity    {}%", record.humidity_percent),
        format!("UV          {}", record.uv_index),
        format!("Feels Like  {}", format_temperature(record.feels_like_celsius, unit)),
    ]
    .join("\n")
}

fn icon_label(icon: &ConditionIcon, icons: &WeatherIcons) -> String {
    match icons.image_name(icon) {
        Some(name) => format!("[{name}]"),
        None => icon.icon_url.clone(),
    }
}
