//! Application settings loaded from `nutrisport.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! `DATABASE_URL` in the environment overrides the configured database.

use super::database::{DEFAULT_DATABASE_URL, database_url_from_env};
use crate::core::{filter::DEFAULT_SEARCH_DEBOUNCE, resolver::DEFAULT_BATCH_SIZE};
use crate::errors::{Error, Result};
use crate::store::DEFAULT_CHANGE_CAPACITY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default settings file location, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "nutrisport.toml";

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database URL; `DATABASE_URL` wins when set
    pub database_url: Option<String>,
    /// Maximum ids per `IN` lookup
    pub batch_size: usize,
    /// Quiet period before a search query edit applies
    pub search_debounce_ms: u64,
    /// Pending changes buffered per live view before it re-syncs
    pub change_capacity: usize,
    /// Catalog file seeded on start, if any
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            search_debounce_ms: u64::try_from(DEFAULT_SEARCH_DEBOUNCE.as_millis()).unwrap_or(500),
            change_capacity: DEFAULT_CHANGE_CAPACITY,
            catalog_path: None,
        }
    }
}

impl Settings {
    /// The database to connect to: `DATABASE_URL`, then the file, then the default.
    #[must_use]
    pub fn database_url(&self) -> String {
        database_url_from_env()
            .or_else(|| self.database_url.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }

    /// Search debounce as a [`Duration`].
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    fn validate(self) -> Result<Self> {
        if self.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str::<Settings>(contents)
        .map_err(|e| Error::Config {
            message: format!("Failed to parse settings: {e}"),
        })?
        .validate()
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid TOML, or sets a
/// zero batch size.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read settings file {}: {e}",
            path.as_ref().display()
        ),
    })?;
    parse_settings(&contents)
}

/// Loads `nutrisport.toml` from the working directory, or defaults when it is absent.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new(DEFAULT_SETTINGS_PATH);
    if path.exists() {
        load_settings(path)
    } else {
        info!("No {} found, using default settings", DEFAULT_SETTINGS_PATH);
        Ok(Settings::default())
    }
}
