//! Configuration management for jvmwatch
//!
//! This module defines the main `Config` struct and its sub-structs, holding
//! every setting the agent needs. It uses the `figment` crate to layer
//! built-in defaults, a `jvmwatch.toml` file, `JVMWATCH_` environment
//! variables and command-line flags, in that order of precedence.

use crate::cli::Cli;
use crate::outputs::TransportTarget;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "jvmwatch.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// The process to monitor.
    pub target: TargetConfig,
    /// Sampling cadence.
    pub monitor: MonitorConfig,
    /// Where and how snapshots are sent.
    pub output: OutputConfig,
    /// Labels attached to every emitted snapshot.
    pub application: ApplicationConfig,
    /// Internal metrics of the agent itself.
    pub metrics: MetricsConfig,
}

/// Identity of the monitored process.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Jolokia endpoint of the monitored JVM, e.g. `http://127.0.0.1:8778/jolokia`.
    pub url: Option<String>,
    /// Expected process id; attaching fails if the endpoint serves another process.
    pub pid: Option<u32>,
    /// Timeout of a single management request in milliseconds.
    pub request_timeout_ms: u64,
}

/// Sampling cadence.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between two samples.
    pub interval_seconds: u64,
}

/// The encoding of emitted snapshots.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Gelf,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Gelf => write!(f, "GELF"),
            OutputFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Configuration of the outbound transport.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// `tcp://host:port`, `udp://host:port` or `stdout://`.
    pub target: String,
    pub format: OutputFormat,
    /// Snapshots buffered by network transports before backpressure applies.
    pub queue_size: usize,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub tcp_no_delay: bool,
    pub send_buffer_size: u32,
}

/// Optional labels identifying the monitored application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: Option<String>,
    pub deployment_unit: Option<String>,
}

/// Configuration for the agent's own metrics.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on `listen_address`.
    pub enabled: bool,
    pub listen_address: SocketAddr,
    /// Also report the agent's own CPU and memory usage.
    pub system_metrics_enabled: bool,
}

impl Config {
    /// Loads the configuration, layering defaults, the TOML file, environment
    /// variables and command-line arguments.
    ///
    /// # Arguments
    /// * `cli` - Parsed command-line arguments. `cli.config` selects the file.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                path.clone()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            // e.g. JVMWATCH_MONITOR__INTERVAL_SECONDS=5
            .merge(Env::prefixed("JVMWATCH_").split("__"))
            .merge(cli.clone())
            .extract()
            .with_context(|| format!("invalid configuration ({})", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks constraints the types alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_seconds == 0 {
            bail!("monitor.interval_seconds must be at least 1");
        }
        if self.output.queue_size == 0 {
            bail!("output.queue_size must be at least 1");
        }
        TransportTarget::from_str(&self.output.target)
            .with_context(|| format!("invalid output.target '{}'", self.output.target))?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            target: TargetConfig::default(),
            monitor: MonitorConfig::default(),
            output: OutputConfig::default(),
            application: ApplicationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: None,
            pid: None,
            request_timeout_ms: 5000,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            target: "stdout://".to_string(),
            format: OutputFormat::Gelf,
            queue_size: 512,
            connect_timeout_ms: 5000,
            reconnect_delay_ms: 1000,
            tcp_no_delay: true,
            send_buffer_size: 32768,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            system_metrics_enabled: false,
        }
    }
}
