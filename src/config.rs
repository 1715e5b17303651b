use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    None,
    Bridge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub docker_host: String,

    // Resource defaults applied to every sandbox container, regardless
    // of isolation runtime.
    pub max_memory_mb: u64,
    pub max_cpu_quota: u64,
    pub max_concurrent_executions: usize,
    pub network_mode: NetworkMode,
    pub drop_all_capabilities: bool,

    // Warm pool. Only ever exercised by the default runtime.
    pub pool_enabled: bool,
    pub pool_max_size: usize,
    pub pool_idle_ttl_secs: u64,
    pub pool_initial_fill: usize,
    pub pool_sweep_interval_secs: u64,

    // The tag the container engine uses to select the hardened runtime.
    pub hardened_runtime_tag: String,

    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,

    pub enable_audit_log: bool,
    pub audit_log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            docker_host: "unix:///var/run/docker.sock".to_string(),

            max_memory_mb: 512,
            max_cpu_quota: 100_000,
            max_concurrent_executions: 10,
            network_mode: NetworkMode::None,
            drop_all_capabilities: true,

            pool_enabled: true,
            pool_max_size: 5,
            pool_idle_ttl_secs: 300,
            pool_initial_fill: 2,
            pool_sweep_interval_secs: 60,

            hardened_runtime_tag: "runsc".to_string(),

            rate_limit_per_minute: 30,
            rate_limit_burst: 10,

            enable_audit_log: true,
            audit_log_path: "./logs/audit.log".to_string(),
        }
    }
}

/// Mirrors `Config` with every field optional, so the `config` crate's
/// `Environment` source only needs to supply the variables an operator
/// actually set. Everything else falls back to `Config::default()`.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    host: Option<String>,
    port: Option<u16>,
    docker_host: Option<String>,
    max_memory_mb: Option<u64>,
    max_cpu_quota: Option<u64>,
    max_concurrent_executions: Option<usize>,
    network_mode: Option<NetworkMode>,
    drop_all_capabilities: Option<bool>,
    pool_enabled: Option<bool>,
    pool_max_size: Option<usize>,
    pool_idle_ttl_secs: Option<u64>,
    pool_initial_fill: Option<usize>,
    pool_sweep_interval_secs: Option<u64>,
    hardened_runtime_tag: Option<String>,
    rate_limit_per_minute: Option<u32>,
    rate_limit_burst: Option<u32>,
    enable_audit_log: Option<bool>,
    audit_log_path: Option<String>,
}

impl Config {
    /// Loads a `.env` file if present, then layers `SANDBOX__*` environment
    /// variables over the defaults via the `config` crate.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let sourced = config::Config::builder()
            .add_source(config::Environment::with_prefix("SANDBOX").separator("__"))
            .build()
            .context("failed to read SANDBOX__* environment variables")?;

        let partial: PartialConfig = sourced
            .try_deserialize()
            .context("failed to parse configuration values")?;

        let defaults = Config::default();
        let config = Config {
            host: partial.host.unwrap_or(defaults.host),
            port: partial.port.unwrap_or(defaults.port),
            docker_host: partial.docker_host.unwrap_or(defaults.docker_host),
            max_memory_mb: partial.max_memory_mb.unwrap_or(defaults.max_memory_mb),
            max_cpu_quota: partial.max_cpu_quota.unwrap_or(defaults.max_cpu_quota),
            max_concurrent_executions: partial
                .max_concurrent_executions
                .unwrap_or(defaults.max_concurrent_executions),
            network_mode: partial.network_mode.unwrap_or(defaults.network_mode),
            drop_all_capabilities: partial
                .drop_all_capabilities
                .unwrap_or(defaults.drop_all_capabilities),
            pool_enabled: partial.pool_enabled.unwrap_or(defaults.pool_enabled),
            pool_max_size: partial.pool_max_size.unwrap_or(defaults.pool_max_size),
            pool_idle_ttl_secs: partial
                .pool_idle_ttl_secs
                .unwrap_or(defaults.pool_idle_ttl_secs),
            pool_initial_fill: partial
                .pool_initial_fill
                .unwrap_or(defaults.pool_initial_fill),
            pool_sweep_interval_secs: partial
                .pool_sweep_interval_secs
                .unwrap_or(defaults.pool_sweep_interval_secs),
            hardened_runtime_tag: partial
                .hardened_runtime_tag
                .unwrap_or(defaults.hardened_runtime_tag),
            rate_limit_per_minute: partial
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            rate_limit_burst: partial.rate_limit_burst.unwrap_or(defaults.rate_limit_burst),
            enable_audit_log: partial.enable_audit_log.unwrap_or(defaults.enable_audit_log),
            audit_log_path: partial.audit_log_path.unwrap_or(defaults.audit_log_path),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be nonzero");
        }
        if self.pool_max_size == 0 {
            anyhow::bail!("pool_max_size must be at least 1");
        }
        if self.rate_limit_per_minute == 0 {
            anyhow::bail!("rate_limit_per_minute must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hardened_runtime_tag, "runsc");
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());
    }
}
