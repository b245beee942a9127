//! # cohort-config
//!
//! Layered configuration loading for Cohort using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`COHORT_*` prefix, `__` as separator)
//! 2. Project-level `.cohort/config.toml`
//! 3. User-level `~/.config/cohort/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `COHORT_BROKER__URL` -> `broker.url`,
//! `COHORT_CACHE__TTL_SECS` -> `cache.ttl_secs`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use cohort_config::CohortConfig;
//!
//! let config = CohortConfig::load_with_dotenv().expect("config");
//! if config.broker.is_configured() {
//!     println!("NATS: {}", config.broker.url);
//! }
//! ```

mod broker;
mod cache;
mod coordinator;
mod database;
mod error;
mod sheets;

pub use broker::BrokerConfig;
pub use cache::CacheConfig;
pub use coordinator::CoordinatorConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use sheets::SheetsConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CohortConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl CohortConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".cohort/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("COHORT_").split("__"))
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::out_of_range("cache.ttl_secs", "must be greater than zero"));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::out_of_range("cache.capacity", "must be greater than zero"));
        }
        if self.coordinator.publish_max_attempts == 0 {
            return Err(ConfigError::out_of_range(
                "coordinator.publish_max_attempts",
                "must be at least 1",
            ));
        }
        if self.coordinator.command_timeout_secs == 0 || self.coordinator.commit_timeout_secs == 0
        {
            return Err(ConfigError::out_of_range(
                "coordinator",
                "timeouts must be greater than zero",
            ));
        }
        if self.broker.max_deliver == 0 {
            return Err(ConfigError::out_of_range("broker.max_deliver", "must be at least 1"));
        }
        if self.broker.subjects.is_empty() {
            return Err(ConfigError::out_of_range("broker.subjects", "must not be empty"));
        }
        Ok(())
    }

    /// Fail unless the recorder's external collaborators are configured.
    pub fn require_recorder(&self) -> Result<(), ConfigError> {
        if !self.broker.is_configured() {
            return Err(ConfigError::MissingSection { section: "broker" });
        }
        if !self.sheets.is_configured() {
            return Err(ConfigError::MissingSection { section: "sheets" });
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cohort").join("config.toml"))
    }
}
