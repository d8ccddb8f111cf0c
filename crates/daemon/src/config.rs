//! Layered configuration for the daemon's resilience/metrics/evolution
//! tunables: built-in defaults, an optional TOML file, then environment
//! overrides (`SENTINEL_*`), following the grounding repo's config-loader
//! layering pattern, scoped to only what this core touches.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sentinel_resilience::{CircuitBreakerConfig, RetryConfig};
use sentinel_skills::EvolutionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub sample_interval_seconds: u64,
    pub data_dir: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval_seconds: 60,
            data_dir: PathBuf::from("./data/metrics"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub retry: RetryConfig,
    pub circuit_breaker_name: String,
    pub evolution: EvolutionConfig,
    pub metrics: MetricsConfig,
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            retry: RetryConfig::default(),
            circuit_breaker_name: "default".to_string(),
            evolution: EvolutionConfig::default(),
            metrics: MetricsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(self.circuit_breaker_name.clone())
    }

    /// Load defaults, merge an optional TOML file if present, then apply
    /// `SENTINEL_`-prefixed environment overrides (double underscore as
    /// the nested-key separator, e.g. `SENTINEL_EVOLUTION__PRUNING_ENABLED`).
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults =
            config::Config::try_from(&DaemonConfig::default()).context("failed to seed config defaults")?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.to_path_buf()));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SENTINEL")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder.build().context("failed to build layered config")?;
        merged
            .try_deserialize::<DaemonConfig>()
            .context("failed to deserialize daemon config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_file_and_no_env_returns_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.circuit_breaker_name, "default");
        assert_eq!(config.retry.max_attempts, RetryConfig::default().max_attempts);
    }

    #[test]
    fn load_with_missing_file_path_falls_back_to_defaults() {
        let config = DaemonConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.evolution.exploration_interval_hours, 24);
    }
}
