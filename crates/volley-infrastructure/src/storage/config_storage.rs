//! Config file storage.
//!
//! Reads `~/.config/volley/config.toml` (or an explicit path) into a
//! [`VolleyConfig`], then applies environment overrides.
//!
//! Priority, highest first:
//! 1. Environment variables (`VOLLEY_BASE_URL`, `VOLLEY_API_KEY`, `VOLLEY_MODEL`)
//! 2. The config file
//! 3. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use volley_core::config::VolleyConfig;
use volley_core::error::{Result, VolleyError};

pub const ENV_BASE_URL: &str = "VOLLEY_BASE_URL";
pub const ENV_API_KEY: &str = "VOLLEY_API_KEY";
pub const ENV_MODEL: &str = "VOLLEY_MODEL";

/// Handle to the TOML configuration file.
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Creates a config storage handle for an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Uses the default location: `~/.config/volley/config.toml`.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Returns the default config path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| VolleyError::config("Could not determine home directory"))?;
        Ok(home.join(".config").join("volley").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file. A missing or empty file yields the defaults.
    pub fn load(&self) -> Result<VolleyConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "config file not found, using defaults");
            return Ok(VolleyConfig::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            VolleyError::config(format!(
                "Failed to read configuration file at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(VolleyConfig::default());
        }

        toml::from_str(&content).map_err(|e| {
            VolleyError::config(format!(
                "Failed to parse configuration file at {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Loads the file and applies process environment overrides.
    pub fn load_with_env(&self) -> Result<VolleyConfig> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Overrides engine settings from `lookup` (normally the process environment).
pub fn apply_env_overrides<F>(config: &mut VolleyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = non_empty(ENV_BASE_URL) {
        config.engine.base_url = base_url;
    }
    if let Some(api_key) = non_empty(ENV_API_KEY) {
        config.engine.api_key = api_key;
    }
    if let Some(model) = non_empty(ENV_MODEL) {
        config.engine.model = model;
    }
}
