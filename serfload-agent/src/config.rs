//! Startup configuration: a TOML file merged with environment overrides.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use serfload_core::load::REPORT_THRESHOLD;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/serfload.toml";

#[derive(Deserialize)]
pub struct Config {
    /// RPC auth token handed to the serf CLI.
    pub rpc_auth: String,
    /// Link capacity of the monitored interface, in Mbit/s.
    pub netspeed: u64,
    /// Interface whose byte counters are sampled.
    pub iface: String,
    /// Informational only; the sampling loop does not consume it.
    #[serde(default)]
    pub cpus: u32,
    /// Seconds between sampling iterations.
    #[serde(default = "default_period")]
    pub period: u64,
    /// Report gate width in percentage points.
    #[serde(default = "default_threshold")]
    pub threshold: i64,
    #[serde(default = "default_serf_bin")]
    pub serf_bin: PathBuf,
    /// Seconds before a serf invocation is abandoned.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout: u64,
}

fn default_period() -> u64 {
    10
}

fn default_threshold() -> i64 {
    REPORT_THRESHOLD
}

fn default_serf_bin() -> PathBuf {
    PathBuf::from("/usr/local/bin/serf")
}

fn default_publish_timeout() -> u64 {
    30
}

/// Loads and validates the configuration; any problem here aborts startup
/// before the loop begins.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SERFLOAD_"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_auth.is_empty() {
            return Err(ConfigError::EmptyAuth);
        }
        if self.netspeed == 0 {
            return Err(ConfigError::ZeroNetspeed);
        }
        if self.iface.is_empty() || self.iface.contains('/') {
            return Err(ConfigError::BadIface(self.iface.clone()));
        }
        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.threshold < 0 {
            return Err(ConfigError::NegativeThreshold(self.threshold));
        }
        Ok(())
    }
}

// keep the auth token out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_auth", &"<redacted>")
            .field("netspeed", &self.netspeed)
            .field("iface", &self.iface)
            .field("cpus", &self.cpus)
            .field("period", &self.period)
            .field("threshold", &self.threshold)
            .field("serf_bin", &self.serf_bin)
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("rpc_auth must not be empty")]
    EmptyAuth,
    #[error("netspeed must be at least 1 Mbit/s")]
    ZeroNetspeed,
    #[error("iface {0:?} is not a plain interface name")]
    BadIface(String),
    #[error("period must be at least 1 second")]
    ZeroPeriod,
    #[error("threshold must not be negative, got {0}")]
    NegativeThreshold(i64),
}
