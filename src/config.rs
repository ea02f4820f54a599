use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::search::SearchStrategy;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// System-of-record backend configuration
    pub store: StoreConfig,

    /// Index synchronization configuration
    pub sync: SyncConfig,

    /// Search gateway configuration
    pub search: SearchConfig,

    /// Slug generation configuration
    #[serde(default)]
    pub slug: SlugConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CWM_)
            .add_source(
                config::Environment::with_prefix("CWM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path for the embedded database (sled)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

/// Sync scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Enable the background sync scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Items selected per cycle, clamped to [`MAX_SYNC_BATCH_SIZE`]
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: usize,

    /// Poll interval between cycles (seconds)
    #[serde(default = "default_sync_poll_interval")]
    pub poll_interval_secs: u64,
}

impl SyncConfig {
    /// Effective batch size after clamping
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_SYNC_BATCH_SIZE)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_sync_batch_size(),
            poll_interval_secs: default_sync_poll_interval(),
        }
    }
}

/// Search gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Active query routing strategy
    #[serde(default)]
    pub strategy: SearchStrategy,

    /// Filesystem path for the full-text index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Index writer heap budget in bytes
    #[serde(default = "default_writer_heap_bytes")]
    pub writer_heap_bytes: usize,

    /// Maximum results returned by a single query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// How long to wait on the index before falling back to the store (ms)
    #[serde(default = "default_fallback_timeout_ms")]
    pub fallback_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            index_path: default_index_path(),
            writer_heap_bytes: default_writer_heap_bytes(),
            max_results: default_max_results(),
            fallback_timeout_ms: default_fallback_timeout_ms(),
        }
    }
}

/// Slug generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugConfig {
    /// Maximum slug length before the id suffix
    #[serde(default = "default_slug_max_length")]
    pub max_length: usize,

    /// Collision-retry attempts before the random-token fallback
    #[serde(default = "default_slug_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_length: default_slug_max_length(),
            max_attempts: default_slug_max_attempts(),
        }
    }
}

/// Hard ceiling on items per sync cycle
pub const MAX_SYNC_BATCH_SIZE: usize = 1000;

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_batch_size() -> usize {
    500
}

fn default_sync_poll_interval() -> u64 {
    30
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/search-index")
}

fn default_writer_heap_bytes() -> usize {
    50_000_000
}

fn default_max_results() -> usize {
    100
}

fn default_fallback_timeout_ms() -> u64 {
    2000
}

fn default_slug_max_length() -> usize {
    100
}

fn default_slug_max_attempts() -> u32 {
    3
}
