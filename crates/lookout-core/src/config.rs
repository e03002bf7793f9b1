//! Configuration management for Lookout.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`LOOKOUT__` prefix, `__` between path segments)
//! 2. Config file (`lookout.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::Result;
use crate::params::JobParameters;

/// Settings for executing analysis jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on batches for a single iterative statement.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Default job parameters. Values given on the command line win.
    #[serde(default)]
    pub parameters: JobParameters,
}

fn default_max_iterations() -> u32 {
    10_000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            parameters: JobParameters::default(),
        }
    }
}

/// Build the layered settings for `file_prefix` (file is optional).
pub fn load_settings(file_prefix: &str) -> Result<config::Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LOOKOUT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one section, falling back to defaults when it is absent.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = key, "Config section not set, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}
