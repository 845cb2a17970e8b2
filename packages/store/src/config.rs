use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Retry policy for catalog transactions.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts before giving up on a contended catalog. Default: 5.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds; doubles per attempt. Default: 1000.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

/// Store application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Catalog connection URL. Default: "sqlite://msa_catalog.db?mode=rwc".
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Root of the blob tree, one subdirectory per category. Default: "msa".
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_database_url() -> String {
    "sqlite://msa_catalog.db?mode=rwc".into()
}
fn default_blob_root() -> PathBuf {
    "msa".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            blob_root: default_blob_root(),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("MSA_STORE_CONFIG").unwrap_or_else(|_| "config/msa-store".to_string());

        let s = Config::builder()
            .set_default("database_url", default_database_url())?
            .set_default("blob_root", "msa")?
            .set_default("retry.max_attempts", 5_i64)?
            .set_default("retry.initial_delay_ms", 1000_i64)?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("MSA_STORE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
