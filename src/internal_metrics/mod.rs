//! # Internal Metrics Module
//!
//! Metrics about the agent itself, recorded through the `metrics` facade.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: installs the Prometheus recorder and spawns the
//!   metrics server (and optionally the `SystemCollector`) on the task manager.
//!
//! - **`Metrics`**: cloneable handles to the counters and gauges the sampling
//!   loop and the transports update.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) an `axum` server exposing
//!   `/metrics` for Prometheus to scrape.
//!
//! - **`SystemCollector`**: (Defined in `system.rs`) a background task that
//!   reports the agent's own CPU and memory usage.
//!
//! When metrics are disabled no recorder is installed and every handle is a no-op.

use crate::config::MetricsConfig;
use crate::core::{GcAccounting, Snapshot};
use crate::internal_metrics::server::MetricsServer;
use crate::internal_metrics::system::SystemCollector;
use crate::task_manager::TaskManager;
use anyhow::{Context, Result};
use metrics::{Counter, Gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod server;
pub mod system;

/// Handles to the agent's metrics.
#[derive(Clone)]
pub struct Metrics {
    pub snapshots_sampled_total: Counter,
    pub snapshots_dropped_total: Counter,
    pub transport_send_failures_total: Counter,
    pub transport_reconnects_total: Counter,
    pub monitored_cpu_load: Gauge,
    pub monitored_gc_load: Gauge,
    pub sampler_attached: Gauge,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Registers descriptions for all metrics with the global recorder and
    /// returns handles to them.
    pub fn new() -> Self {
        metrics::describe_counter!("snapshots_sampled_total", Unit::Count, "Total number of snapshots taken from the monitored process.");
        metrics::describe_counter!("snapshots_dropped_total", Unit::Count, "Total number of snapshots dropped because the transport applied backpressure.");
        metrics::describe_counter!("transport_send_failures_total", Unit::Count, "Total number of accepted snapshots the transport failed to deliver.");
        metrics::describe_counter!("transport_reconnects_total", Unit::Count, "Total number of transport reconnection attempts.");
        metrics::describe_gauge!("monitored_cpu_load", "CPU load of the monitored process in the last sample (1.0 = one core).");
        metrics::describe_gauge!("monitored_gc_load", "Share of the last interval the monitored process spent in garbage collection.");
        metrics::describe_gauge!("monitored_gc_generation_load", "Garbage collection load per generation, when the collector set allows it.");
        metrics::describe_gauge!("sampler_attached", "1 while the sampler is attached to the monitored process, 0 otherwise.");
        metrics::describe_gauge!("agent_process_cpu_usage_percent", Unit::Percent, "The percentage of CPU time the jvmwatch process itself is using.");
        metrics::describe_gauge!("agent_process_memory_usage_bytes", Unit::Bytes, "Resident set size of the jvmwatch process, in bytes.");

        Self::handles()
    }

    /// Handles that are not described. Used when metrics are disabled.
    pub fn disabled() -> Self {
        Self::handles()
    }

    /// Creates a `Metrics` instance suitable for testing.
    ///
    /// Without an installed recorder the `metrics` facade is a no-op, so tests
    /// can build components that need handles without any backend.
    pub fn new_for_test() -> Self {
        Self::new()
    }

    fn handles() -> Self {
        Self {
            snapshots_sampled_total: metrics::counter!("snapshots_sampled_total"),
            snapshots_dropped_total: metrics::counter!("snapshots_dropped_total"),
            transport_send_failures_total: metrics::counter!("transport_send_failures_total"),
            transport_reconnects_total: metrics::counter!("transport_reconnects_total"),
            monitored_cpu_load: metrics::gauge!("monitored_cpu_load"),
            monitored_gc_load: metrics::gauge!("monitored_gc_load"),
            sampler_attached: metrics::gauge!("sampler_attached"),
        }
    }

    /// Records the figures of a freshly taken snapshot.
    pub fn record_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots_sampled_total.increment(1);
        self.monitored_cpu_load.set(snapshot.cpu_load);
        self.monitored_gc_load.set(snapshot.gc_accounting.load());
        if let GcAccounting::Detailed(detailed) = &snapshot.gc_accounting {
            metrics::gauge!("monitored_gc_generation_load", "generation" => "young")
                .set(detailed.young.load);
            metrics::gauge!("monitored_gc_generation_load", "generation" => "old")
                .set(detailed.old.load);
        }
    }

    pub fn set_attached(&self, attached: bool) {
        self.sampler_attached.set(if attached { 1.0 } else { 0.0 });
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle together
    /// with the address the metrics server listens on.
    ///
    /// If metrics are disabled, or the recorder cannot be installed, this
    /// returns disabled handles and no address. The agent keeps running
    /// without metrics in that case.
    pub fn build(self, task_manager: &TaskManager) -> (Metrics, Option<SocketAddr>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        match self.install(task_manager) {
            Ok((metrics, addr)) => {
                info!(%addr, "Serving Prometheus metrics on /metrics");
                (metrics, Some(addr))
            }
            Err(e) => {
                error!("Metrics disabled: {:#}", e);
                (Metrics::disabled(), None)
            }
        }
    }

    fn install(&self, task_manager: &TaskManager) -> Result<(Metrics, SocketAddr)> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        // Bind before installing the recorder so a busy port leaves no global state behind.
        let listener = std::net::TcpListener::bind(self.config.listen_address).with_context(|| {
            format!(
                "failed to bind metrics server to {}",
                self.config.listen_address
            )
        })?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;

        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, task_manager.get_shutdown_rx());
        task_manager.spawn("MetricsServer", server.run());

        if self.config.system_metrics_enabled {
            let collector = SystemCollector::new();
            task_manager.spawn(
                "SystemCollector",
                collector.run(task_manager.get_shutdown_rx()),
            );
        }

        Ok((metrics, addr))
    }
}
