//! Configuration management for the similarity search subsystem

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod loader;
pub mod validation;

/// Default similarity source table in the data warehouse
pub const DEFAULT_TABLE_ID: &str = "bgg-data-warehouse.analytics.game_similarity_search";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend selection and scoring-service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Always query the warehouse directly, even if a service URL is set
    #[serde(default)]
    pub force_direct: bool,

    /// Base URL of the scoring service; unset means direct mode
    #[serde(default)]
    pub service_url: Option<String>,

    /// Service request timeout in seconds
    #[serde(default = "default_timeout")]
    pub service_timeout_secs: u64,

    /// Fail fast while the service keeps erroring
    #[serde(default = "default_circuit_breaker_enabled")]
    pub circuit_breaker_enabled: bool,

    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: usize,

    /// Seconds the circuit stays open before probing again
    #[serde(default = "default_circuit_reset")]
    pub circuit_reset_secs: u64,
}

/// Warehouse connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Fully qualified `project.dataset.table` of the similarity table
    #[serde(default = "default_table_id")]
    pub table_id: String,

    /// BigQuery REST API root
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// OAuth access token (secured)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub access_token: Option<Secret<String>>,

    /// Service-account key file, used when no access token is set
    #[serde(default)]
    pub credentials_file: Option<String>,

    /// Fall back to application default credentials
    #[serde(default = "default_default_credentials")]
    pub default_credentials: bool,

    /// Processing location, e.g. `US`
    #[serde(default)]
    pub location: Option<String>,

    /// Query timeout in seconds, enforced by the warehouse
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of cached result sets
    #[serde(default = "default_cache_size")]
    pub max_size: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json`, `compact` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 2 }
fn default_circuit_breaker_enabled() -> bool { true }
fn default_failure_threshold() -> usize { 5 }
fn default_circuit_reset() -> u64 { 60 }
fn default_table_id() -> String { DEFAULT_TABLE_ID.to_string() }
fn default_default_credentials() -> bool { true }
fn default_api_url() -> String { "https://bigquery.googleapis.com/bigquery/v2".to_string() }
fn default_cache_enabled() -> bool { true }
fn default_cache_ttl() -> u64 { 3600 } // 1 hour
fn default_cache_size() -> u64 { 1000 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            force_direct: false,
            service_url: None,
            service_timeout_secs: default_timeout(),
            circuit_breaker_enabled: default_circuit_breaker_enabled(),
            circuit_failure_threshold: default_failure_threshold(),
            circuit_reset_secs: default_circuit_reset(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            table_id: default_table_id(),
            api_url: default_api_url(),
            access_token: None,
            credentials_file: None,
            default_credentials: default_default_credentials(),
            location: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
            max_size: default_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let config = loader::load_config(path)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file with environment variable overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let config = loader::load_config_with_env(Some(path.as_ref()))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from the environment only
    pub fn from_env() -> crate::error::Result<Self> {
        let config = loader::load_config_with_env(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(toml: &str) -> crate::error::Result<Self> {
        let config = loader::load_config_from_str(toml)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        validation::validate_config(self)
    }

    /// Direct mode against the default table, cache on
    pub fn default_config() -> Self {
        Self {
            backend: BackendConfig::default(),
            warehouse: WarehouseConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Custom serializer for Option<Secret<String>>
fn serialize_optional_secret<S>(secret: &Option<Secret<String>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Custom deserializer for Option<Secret<String>>
fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<Secret<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.is_empty()).map(Secret::new))
}
