//! # System Metrics Collector
//!
//! Periodically reports the agent's own CPU and memory usage via `sysinfo`,
//! so the cost of monitoring stays visible next to what is monitored.

use std::time::Duration;
use sysinfo::System;
use tokio::sync::watch;
use tokio::time;
use tracing::{error, trace};

const SYSTEM_METRICS_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

pub struct SystemCollector {
    system: System,
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Runs the collection loop until `shutdown_rx` fires.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                error!("Failed to get current PID: {}", e);
                return;
            }
        };
        let mut interval = time::interval(SYSTEM_METRICS_COLLECTION_INTERVAL);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {
                    self.system.refresh_cpu();
                    if !self.system.refresh_process(pid) {
                        error!(%pid, "Own process not found, stopping system metrics");
                        break;
                    }
                    if let Some(process) = self.system.process(pid) {
                        metrics::gauge!("agent_process_cpu_usage_percent")
                            .set(process.cpu_usage() as f64);
                        metrics::gauge!("agent_process_memory_usage_bytes")
                            .set(process.memory() as f64);
                    }
                }
            }
        }
        trace!("System collector finished.");
    }
}
