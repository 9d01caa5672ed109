//! Collector configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix, e.g. `COLLECTOR_QUERY_PORT`
const ENV_PREFIX: &str = "COLLECTOR";

/// Collector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port for `/ping`, `/history`, `/stream` and probes
    #[serde(default = "default_query_port")]
    pub query_port: u16,

    /// Port for `/events`
    #[serde(default = "default_ingest_port")]
    pub ingest_port: u16,

    /// Sampling (and stream push) interval in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Entries retained per history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// procfs mount to read vmstat/diskstats from
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_query_port() -> u16 {
    3100
}

fn default_ingest_port() -> u16 {
    3101
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_history_capacity() -> usize {
    agent_lib::DEFAULT_HISTORY_CAPACITY
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::load_with_prefix(ENV_PREFIX)
    }

    fn load_with_prefix(prefix: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()
            .context("Failed to read collector configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid collector configuration")?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            anyhow::bail!("sample_interval_ms must be greater than zero");
        }
        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be greater than zero");
        }
        if self.query_port != 0 && self.query_port == self.ingest_port {
            anyhow::bail!(
                "query_port and ingest_port must differ (both {})",
                self.query_port
            );
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        let config = AgentConfig::load_with_prefix("COLLECTOR_TEST_DEFAULTS").unwrap();

        assert_eq!(config.query_port, 3100);
        assert_eq!(config.ingest_port, 3101);
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert_eq!(config.history_capacity, 900);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("COLLECTOR_TEST_OVERRIDE_QUERY_PORT", "9100");
        std::env::set_var("COLLECTOR_TEST_OVERRIDE_HISTORY_CAPACITY", "60");
        std::env::set_var("COLLECTOR_TEST_OVERRIDE_SAMPLE_INTERVAL_MS", "250");

        let config = AgentConfig::load_with_prefix("COLLECTOR_TEST_OVERRIDE").unwrap();

        assert_eq!(config.query_port, 9100);
        assert_eq!(config.history_capacity, 60);
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_interval_rejected() {
        std::env::set_var("COLLECTOR_TEST_ZERO_SAMPLE_INTERVAL_MS", "0");

        assert!(AgentConfig::load_with_prefix("COLLECTOR_TEST_ZERO").is_err());
    }

    #[test]
    fn test_same_ports_rejected() {
        std::env::set_var("COLLECTOR_TEST_PORTS_QUERY_PORT", "4000");
        std::env::set_var("COLLECTOR_TEST_PORTS_INGEST_PORT", "4000");

        assert!(AgentConfig::load_with_prefix("COLLECTOR_TEST_PORTS").is_err());
    }
}
