use std::{fmt, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cityweather_core::{
    CacheService, Config, DiskCacheService, FixtureWeatherService, SearchOrchestrator, SearchState,
    SubmitOutcome, TemperatureUnit, WeatherApiService, WeatherIcons, WeatherRecord,
    WeatherService,
};
use inquire::{Password, Select, Text};

use crate::render::{render, result_line};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Current weather for any city")]
pub struct Cli {
    /// Log filter, e.g. "info" or "cityweather_core=debug".
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com API key.
    Configure,

    /// Search for cities and pick one to keep as the last viewed city.
    Search {
        /// First query to run; prompts when absent.
        query: Option<String>,

        /// Serve canned data instead of calling WeatherAPI.com.
        #[arg(long)]
        offline: bool,
    },

    /// Show the last viewed city.
    Show,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Search { query, offline } => {
                let config = Config::load()?;
                search(&config, query, offline).await
            }
            Command::Show => {
                let config = Config::load()?;
                let state = cache_for(&config)
                    .load()
                    .map(SearchState::Detail)
                    .unwrap_or_default();
                println!("{}", render(&state, config.temperature_unit, &icons_for(&config)));
                Ok(())
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("WeatherAPI.com API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key);
    config.api_key()?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn search(config: &Config, query: Option<String>, offline: bool) -> anyhow::Result<()> {
    let service: Arc<dyn WeatherService> = if offline {
        Arc::new(FixtureWeatherService::new(Duration::from_secs(1)))
    } else {
        Arc::new(WeatherApiService::from_config(config)?)
    };
    let disk_cache = cache_for(config);
    tracing::debug!(cache = %disk_cache.path().display(), offline, "Starting interactive search");
    let cache: Arc<dyn CacheService> = Arc::new(disk_cache);
    let icons = icons_for(config);
    let unit = config.temperature_unit;

    let mut orchestrator = SearchOrchestrator::new(service, Some(cache));
    orchestrator.restore_from_cache();

    let mut pending = query;
    loop {
        let state = orchestrator.state();
        println!("\n{}\n", render(&state, unit, &icons));

        if let SearchState::Results(records) = state {
            if let Some(record) = pick_city(records, unit, &icons)? {
                orchestrator.select(record);
                continue;
            }
        }

        let next = match pending.take() {
            Some(query) => query,
            None => match Text::new("Search Location:").prompt_skippable()? {
                Some(query) if !query.trim().is_empty() => query,
                _ => break,
            },
        };

        orchestrator.set_search_query(next);
        if orchestrator.submit() == SubmitOutcome::Started {
            println!("{}", render(&orchestrator.state(), unit, &icons));
            orchestrator.finish_search().await;
        }
    }

    Ok(())
}

struct CityChoice {
    label: String,
    record: WeatherRecord,
}

impl fmt::Display for CityChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn pick_city(
    records: Vec<WeatherRecord>,
    unit: TemperatureUnit,
    icons: &WeatherIcons,
) -> anyhow::Result<Option<WeatherRecord>> {
    if records.is_empty() {
        return Ok(None);
    }

    let choices = records
        .into_iter()
        .map(|record| CityChoice { label: result_line(&record, unit, icons), record })
        .collect();

    let picked = Select::new("Pick a city (Esc to search again):", choices).prompt_skippable()?;
    Ok(picked.map(|choice| choice.record))
}

fn cache_for(config: &Config) -> DiskCacheService {
    config
        .cache_path
        .clone()
        .map(DiskCacheService::new)
        .unwrap_or_default()
}

fn icons_for(config: &Config) -> WeatherIcons {
    config
        .icons_path
        .as_deref()
        .map(WeatherIcons::load)
        .unwrap_or_default()
}
