//! Application configuration management.
//!
//! Configuration is stored at `~/.config/matricache/config.json`; a missing
//! file means defaults. A few fields can be overridden from the environment
//! (see [`Config::apply_env`]), which is how the API token is usually given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStore, FileStorage};
use crate::resources::Resource;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "matricache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "MATRICACHE_API_URL";
const ENV_TOKEN: &str = "MATRICACHE_TOKEN";
const ENV_CACHE_DIR: &str = "MATRICACHE_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Age after which cached data counts as stale.
    pub max_age_secs: u64,
    /// Overrides every resource's own polling interval.
    pub poll_interval_secs: Option<u64>,
    /// Refuse to persist a cache blob larger than this.
    pub storage_quota_bytes: Option<usize>,
    /// Write logs to daily files here in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            api_token: None,
            cache_dir: None,
            max_age_secs: 300,
            poll_interval_secs: None,
            storage_quota_bytes: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `MATRICACHE_*` environment overrides.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn poll_interval(&self, resource: Resource) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| resource.poll_interval())
    }

    /// Open the file-backed cache in the configured directory.
    pub fn open_store(&self) -> Result<CacheStore> {
        let dir = self.cache_dir()?;
        let mut storage = FileStorage::new(&dir)
            .with_context(|| format!("Failed to open cache directory: {}", dir.display()))?;
        if let Some(quota) = self.storage_quota_bytes {
            storage = storage.with_quota(quota);
        }
        Ok(CacheStore::with_system_clock(storage))
    }
}
