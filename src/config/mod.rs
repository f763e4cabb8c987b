//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workload: WorkloadConfig::default(),
            network: NetworkConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Workload configuration
///
/// Describes the numeric range to integrate and how finely to split it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Left edge of the workload range (inclusive)
    #[serde(default = "default_range_start")]
    pub range_start: f64,
    /// Right edge of the workload range (exclusive)
    #[serde(default = "default_range_end")]
    pub range_end: f64,
    /// Number of subtasks the range is partitioned into
    #[serde(default = "default_num_tasks")]
    pub num_tasks: usize,
    /// Trapezoid count used by the work function per subtask
    #[serde(default = "default_samples_per_task")]
    pub samples_per_task: u32,
}

fn default_range_start() -> f64 {
    0.0
}

fn default_range_end() -> f64 {
    1.0
}

fn default_num_tasks() -> usize {
    100
}

fn default_samples_per_task() -> u32 {
    1000
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            range_start: default_range_start(),
            range_end: default_range_end(),
            num_tasks: default_num_tasks(),
            samples_per_task: default_samples_per_task(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// UDP port for the discovery probe/reply exchange
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// TCP port workers serve tasks on
    #[serde(default = "default_task_port")]
    pub task_port: u16,
    /// Address the discovery probe is broadcast to
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: Ipv4Addr,
    /// Number of discovery receive attempts (fixed count, not time-bounded)
    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,
    /// Upper bound on a single discovery receive attempt (milliseconds)
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    /// Upper bound on a worker connect attempt (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Interval between reconnection passes over disconnected workers (milliseconds)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Cap on concurrently served task connections (worker side)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_discovery_port() -> u16 {
    8888
}

fn default_task_port() -> u16 {
    9999
}

fn default_broadcast_addr() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_discovery_attempts() -> u32 {
    5
}

fn default_discovery_timeout_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_max_connections() -> usize {
    100
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            task_port: default_task_port(),
            broadcast_addr: default_broadcast_addr(),
            discovery_attempts: default_discovery_attempts(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_connections: default_max_connections(),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Print operational detail to stderr
    #[serde(default)]
    pub debug: bool,
    /// Emit the final summary as JSON instead of text
    #[serde(default)]
    pub json: bool,
}

/// Parse a TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse a TOML configuration from a string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a loaded configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &cli::Cli, mut config: Config) -> Config {
    if let Some(start) = cli.range_start {
        config.workload.range_start = start;
    }
    if let Some(end) = cli.range_end {
        config.workload.range_end = end;
    }
    if let Some(tasks) = cli.tasks {
        config.workload.num_tasks = tasks;
    }
    if let Some(samples) = cli.samples {
        config.workload.samples_per_task = samples;
    }

    if let Some(port) = cli.discovery_port {
        config.network.discovery_port = port;
    }
    if let Some(port) = cli.task_port {
        config.network.task_port = port;
    }
    if let Some(addr) = cli.broadcast_addr {
        config.network.broadcast_addr = addr;
    }
    if let Some(attempts) = cli.discovery_attempts {
        config.network.discovery_attempts = attempts;
    }
    if let Some(cap) = cli.max_connections {
        config.network.max_connections = cap;
    }

    if cli.debug {
        config.runtime.debug = true;
    }
    if cli.json {
        config.runtime.json = true;
    }

    config
}

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workload(&config.workload)?;
    validate_network(&config.network)?;
    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if !workload.range_start.is_finite() || !workload.range_end.is_finite() {
        anyhow::bail!(
            "workload range must be finite, got [{}, {})",
            workload.range_start,
            workload.range_end
        );
    }

    if workload.range_start >= workload.range_end {
        anyhow::bail!(
            "range_start ({}) must be less than range_end ({})",
            workload.range_start,
            workload.range_end
        );
    }

    if workload.num_tasks == 0 {
        anyhow::bail!("num_tasks must be at least 1");
    }

    if workload.samples_per_task == 0 {
        anyhow::bail!("samples_per_task must be at least 1");
    }

    Ok(())
}

/// Validate network configuration
pub fn validate_network(network: &NetworkConfig) -> Result<()> {
    if network.discovery_port == network.task_port {
        anyhow::bail!(
            "discovery_port and task_port must differ, both are {}",
            network.discovery_port
        );
    }

    if network.discovery_attempts == 0 {
        anyhow::bail!("discovery_attempts must be at least 1");
    }

    if network.max_connections == 0 {
        anyhow::bail!("max_connections must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workload.range_start, 0.0);
        assert_eq!(config.workload.range_end, 1.0);
        assert_eq!(config.workload.num_tasks, 100);
        assert_eq!(config.network.discovery_port, 8888);
        assert_eq!(config.network.task_port, 9999);
        assert_eq!(config.network.discovery_attempts, 5);
        assert!(!config.runtime.debug);
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut config = Config::default();
        config.workload.range_start = 2.0;
        config.workload.range_end = 1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_tasks() {
        let mut config = Config::default();
        config.workload.num_tasks = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_equal_ports() {
        let mut config = Config::default();
        config.network.task_port = config.network.discovery_port;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_parse_toml_string() {
        let toml = r#"
            [workload]
            range_start = 0.0
            range_end = 4.0
            num_tasks = 16

            [network]
            discovery_port = 7777

            [runtime]
            debug = true
        "#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.workload.range_end, 4.0);
        assert_eq!(config.workload.num_tasks, 16);
        // Unspecified fields fall back to defaults
        assert_eq!(config.workload.samples_per_task, 1000);
        assert_eq!(config.network.discovery_port, 7777);
        assert_eq!(config.network.task_port, 9999);
        assert!(config.runtime.debug);
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workload]").unwrap();
        writeln!(file, "num_tasks = 8").unwrap();
        file.flush().unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.workload.num_tasks, 8);
    }

    #[test]
    fn test_parse_toml_rejects_garbage() {
        assert!(parse_toml_string("not toml at all [[[").is_err());
    }
}
