use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "SUMO_EXPLORER_CONFIG";

/// Main explorer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Backend connection configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Search behaviour (page sizes, cache, snapshots)
    #[serde(default)]
    pub search: SearchSettings,
}

impl ExplorerConfig {
    /// Load configuration from embedded defaults, an optional file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/explorer.toml".to_string());

        let config: ExplorerConfig = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SUMO_EXPLORER__)
            .add_source(
                config::Environment::with_prefix("SUMO_EXPLORER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the search engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url().trim().is_empty() {
            return Err(ExplorerError::Configuration(
                "backend base URL must not be empty".to_string(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ExplorerError::Configuration(
                "backend.timeout_secs must be positive".to_string(),
            ));
        }
        self.search.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Sumo environment (prod, preview, dev, ...)
    #[serde(default = "default_env")]
    pub env: String,

    /// Explicit base URL; overrides `env` when set
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl BackendConfig {
    /// Base URL of the Sumo API for this configuration
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://main-sumo-{}.radix.equinor.com/api/v1", self.env),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            base_url: None,
            token: None,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Tunables for search contexts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchSettings {
    /// Page size used when resolving matching ids
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Buckets requested per aggregation page
    #[serde(default = "default_page_size")]
    pub bucket_page_size: usize,

    /// Capacity of each context's document cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Number of ids fetched ahead while iterating
    #[serde(default = "default_prefetch_window")]
    pub prefetch_window: usize,

    /// Keep-alive of point-in-time snapshots
    #[serde(default = "default_keep_alive")]
    pub snapshot_keep_alive: String,

    /// Bucket size of the timestamp/interval aggregations
    #[serde(default = "default_interval_bucket_size")]
    pub interval_bucket_size: usize,
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("search.page_size", self.page_size),
            ("search.bucket_page_size", self.bucket_page_size),
            ("search.cache_capacity", self.cache_capacity),
            ("search.interval_bucket_size", self.interval_bucket_size),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ExplorerError::Configuration(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        if self.snapshot_keep_alive.trim().is_empty() {
            return Err(ExplorerError::Configuration(
                "search.snapshot_keep_alive must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            bucket_page_size: default_page_size(),
            cache_capacity: default_cache_capacity(),
            prefetch_window: default_prefetch_window(),
            snapshot_keep_alive: default_keep_alive(),
            interval_bucket_size: default_interval_bucket_size(),
        }
    }
}

/// Builder for ExplorerConfig
pub struct ExplorerConfigBuilder {
    config: ExplorerConfig,
}

impl ExplorerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExplorerConfig::default(),
        }
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.config.backend.env = env.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.backend.token = Some(token.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.backend.timeout_secs = secs;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.search.page_size = size;
        self
    }

    pub fn bucket_page_size(mut self, size: usize) -> Self {
        self.config.search.bucket_page_size = size;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.search.cache_capacity = capacity;
        self
    }

    pub fn prefetch_window(mut self, window: usize) -> Self {
        self.config.search.prefetch_window = window;
        self
    }

    pub fn snapshot_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.config.search.snapshot_keep_alive = keep_alive.into();
        self
    }

    pub fn build(self) -> ExplorerConfig {
        self.config
    }
}

impl Default for ExplorerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Default value functions
fn default_env() -> String {
    "prod".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "sumo-explorer".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_cache_capacity() -> usize {
    200
}

fn default_prefetch_window() -> usize {
    100
}

fn default_keep_alive() -> String {
    "1m".to_string()
}

fn default_interval_bucket_size() -> usize {
    50
}
