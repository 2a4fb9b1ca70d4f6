use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for any path that is not an API route
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root scanned recursively for `.m3u` / `.m3u8` files
    #[serde(default = "default_streams_dir")]
    pub streams_dir: PathBuf,
    /// JSON snapshot of the last aggregation or validation pass
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Number of concurrent probe workers per validation pass
    #[serde(default = "default_validation_workers")]
    pub workers: usize,
    /// Upper bound on a single availability probe
    #[serde(default = "default_probe_timeout", with = "duration_serde::duration")]
    pub probe_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Shape of the cached and served JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    /// Channel groups with nested streams
    #[default]
    Grouped,
    /// One entry per playlist line pair, no grouping
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub format: CacheFormat,
    /// Write the unvalidated aggregation to the cache file on a read miss
    #[serde(default = "default_persist_on_miss")]
    pub persist_on_miss: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_streams_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STREAMS_DIR)
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_FILE)
}

fn default_validation_workers() -> usize {
    DEFAULT_VALIDATION_WORKERS
}

fn default_probe_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_PROBE_TIMEOUT).unwrap_or(Duration::from_secs(5))
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_persist_on_miss() -> bool {
    DEFAULT_PERSIST_ON_MISS
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            streams_dir: default_streams_dir(),
            cache_file: default_cache_file(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            workers: default_validation_workers(),
            probe_timeout: default_probe_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            format: CacheFormat::default(),
            persist_on_miss: default_persist_on_miss(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
