//! Pool Configuration
//!
//! Loaded from an optional TOML file, then overridden by `ACTORS_`-prefixed
//! environment variables:
//!
//! ```toml
//! threads = 8
//! thread_name_prefix = "search-worker"
//! ```
//!
//! `ACTORS_THREADS=2` would then win over the file.

use crate::error::{ActorError, Result};
use crate::pool::DEFAULT_POOL_SIZE;
use anyhow::Context;
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ACTORS";

/// Default worker thread name prefix
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "actor-worker";

/// Thread pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker contexts
    pub threads: usize,
    /// Worker threads are named `{prefix}-{index}`
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_POOL_SIZE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading pool config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: PoolConfig = builder
            .build()
            .context("Failed to build pool configuration")?
            .try_deserialize()
            .context("Failed to deserialize pool configuration")?;

        config.validate().context("Invalid pool configuration")?;
        debug!(
            threads = config.threads,
            thread_name_prefix = %config.thread_name_prefix,
            "Pool configuration loaded"
        );
        Ok(config)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ActorError::configuration(
                "threads must be greater than zero",
                Some("threads"),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ActorError::configuration(
                "thread_name_prefix must not be empty",
                Some("thread_name_prefix"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PoolConfig::default();
        assert_eq!(config.threads, 4);
        assert_eq!(config.thread_name_prefix, "actor-worker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_names_field() {
        let config = PoolConfig {
            threads: 0,
            ..PoolConfig::default()
        };
        match config.validate() {
            Err(ActorError::Configuration { field, .. }) => {
                assert_eq!(field.as_deref(), Some("threads"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let config = PoolConfig {
            thread_name_prefix: "  ".to_string(),
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    // Environment variables are process-wide, so every loading case lives in
    // this one test.
    #[test]
    fn test_load_from_file_and_environment() {
        std::env::remove_var("ACTORS_THREADS");
        std::env::remove_var("ACTORS_THREAD_NAME_PREFIX");

        let defaults = PoolConfig::load(None).unwrap();
        assert_eq!(defaults, PoolConfig::default());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "threads = 8").unwrap();
        writeln!(file, "thread_name_prefix = \"search-worker\"").unwrap();

        let from_file = PoolConfig::load(Some(file.path())).unwrap();
        assert_eq!(from_file.threads, 8);
        assert_eq!(from_file.thread_name_prefix, "search-worker");

        std::env::set_var("ACTORS_THREADS", "2");
        let overridden = PoolConfig::load(Some(file.path())).unwrap();
        assert_eq!(overridden.threads, 2);
        assert_eq!(overridden.thread_name_prefix, "search-worker");

        std::env::set_var("ACTORS_THREADS", "0");
        assert!(PoolConfig::load(None).is_err());
        std::env::remove_var("ACTORS_THREADS");

        let missing = file.path().with_extension("missing.toml");
        assert!(PoolConfig::load(Some(&missing)).is_err());
    }
}
