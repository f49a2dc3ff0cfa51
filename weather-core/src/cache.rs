use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::model::WeatherRecord;

pub const CACHE_FILE_NAME: &str = "CityWeatherCache.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode weather record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write cache file: {0}")]
    Io(#[from] std::io::Error),
}

/// Single slot holding the last viewed weather record.
pub trait CacheService: Send + Sync {
    /// Stores `weather` in the background; failures are logged, never returned.
    fn save(&self, weather: &WeatherRecord);

    /// The stored record, or `None` when nothing usable is stored.
    fn load(&self) -> Option<WeatherRecord>;
}

/// Keeps the record as JSON in one file.
///
/// Every write replaces the whole file through a rename, so a concurrent
/// `load` sees either the previous or the new record. Concurrent saves race
/// and the last rename wins.
#[derive(Debug, Clone)]
pub struct DiskCacheService {
    path: PathBuf,
}

impl Default for DiskCacheService {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl DiskCacheService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `CityWeatherCache.json` in the system temporary directory.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(CACHE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronously replaces the cache file with `weather`.
    pub fn write(&self, weather: &WeatherRecord) -> Result<(), CacheError> {
        let data = serde_json::to_vec(weather)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // the temp file must live on the target's filesystem
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&data)?;
        temp.persist(&self.path).map_err(|e| CacheError::Io(e.error))?;

        debug!(bytes = data.len(), path = %self.path.display(), "Wrote cache file");
        Ok(())
    }
}

impl CacheService for DiskCacheService {
    fn save(&self, weather: &WeatherRecord) {
        let cache = self.clone();
        let weather = weather.clone();
        let job = move || {
            if let Err(e) = cache.write(&weather) {
                error!(path = %cache.path.display(), error = %e, "Failed to save cache");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                std::thread::spawn(job);
            }
        }
    }

    fn load(&self) -> Option<WeatherRecord> {
        if !self.path.exists() {
            trace!(path = %self.path.display(), "Cache file does not exist");
            return None;
        }

        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "Failed to read cache file");
                return None;
            }
        };
        info!(bytes = data.len(), "Read cache file");

        match serde_json::from_slice::<WeatherRecord>(&data) {
            Ok(weather) if weather.is_valid() => Some(weather),
            Ok(_) => {
                warn!("Cached record is out of range, ignoring it");
                None
            }
            Err(e) => {
                warn!(error = %e, "Cache file did not decode");
                None
            }
        }
    }
}
