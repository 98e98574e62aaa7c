//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `jvmwatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Samples a running JVM and ships its CPU, GC and memory figures as log events.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Expected process id of the monitored JVM.
    #[arg(long, value_name = "PID")]
    pub pid: Option<u32>,

    /// Jolokia endpoint of the monitored JVM.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Seconds between two samples.
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Output target: tcp://host:port, udp://host:port or stdout://.
    #[arg(short, long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Application name attached to every event.
    #[arg(long, value_name = "NAME")]
    pub application: Option<String>,

    /// Deployment unit attached to every event.
    #[arg(long, value_name = "UNIT")]
    pub deployment_unit: Option<String>,

    /// Emit plain JSON snapshots instead of GELF messages.
    #[arg(long)]
    pub json: bool,

    /// Logging level (e.g. "debug", "info").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// Inserts `key = value` into the `section` table of `dict`.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::from(Dict::new()));
    if let Value::Dict(_, table) = entry {
        table.insert(key.to_string(), value);
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(pid) = self.pid {
            insert_nested(&mut dict, "target", "pid", Value::from(pid));
        }
        if let Some(url) = &self.url {
            insert_nested(&mut dict, "target", "url", Value::from(url.clone()));
        }
        if let Some(interval) = self.interval {
            insert_nested(&mut dict, "monitor", "interval_seconds", Value::from(interval));
        }
        if let Some(target) = &self.target {
            insert_nested(&mut dict, "output", "target", Value::from(target.clone()));
        }
        // Only an explicit flag overrides the configured format.
        if self.json {
            insert_nested(&mut dict, "output", "format", Value::from("Json"));
        }
        if let Some(name) = &self.application {
            insert_nested(&mut dict, "application", "name", Value::from(name.clone()));
        }
        if let Some(unit) = &self.deployment_unit {
            insert_nested(
                &mut dict,
                "application",
                "deployment_unit",
                Value::from(unit.clone()),
            );
        }
        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
