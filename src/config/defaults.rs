/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Storage defaults
pub const DEFAULT_STREAMS_DIR: &str = "./streams";
pub const DEFAULT_CACHE_FILE: &str = "./json/config.json";

// Validation defaults
pub const DEFAULT_VALIDATION_WORKERS: usize = 10;
pub const DEFAULT_PROBE_TIMEOUT: &str = "5s";
pub const DEFAULT_USER_AGENT: &str = concat!("m3u-aggregator/", env!("CARGO_PKG_VERSION"));

// Cache defaults
pub const DEFAULT_PERSIST_ON_MISS: bool = false;
