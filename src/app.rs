//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{CounterSource, Transport},
    internal_metrics::{Metrics, MetricsBuilder},
    monitor::{Monitor, MonitorExit},
    outputs::build_transport,
    sampler::Sampler,
    source::JolokiaSource,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// A handle to the running agent.
pub struct App {
    monitor: JoinHandle<MonitorExit>,
    transport: Arc<dyn Transport>,
    task_manager: TaskManager,
    background_shutdown_tx: watch::Sender<bool>,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the sampling loop to end, then flushes the transport and
    /// stops the background tasks.
    ///
    /// # Returns
    /// Why sampling stopped: requested shutdown or a lost connection.
    pub async fn run(self) -> Result<MonitorExit> {
        let exit = self.monitor.await.context("monitor task failed")?;
        info!(?exit, "Sampling stopped, shutting down");

        self.transport.close().await;
        shutdown_background(self.background_shutdown_tx, self.task_manager).await;

        info!("All tasks shut down.");
        Ok(exit)
    }
}

/// Builder for the application.
///
/// Separates constructing the components from running them, and lets tests
/// replace the counter source, the transport and the metrics handles.
pub struct AppBuilder {
    config: Config,
    counter_source_override: Option<Box<dyn CounterSource>>,
    transport_override: Option<Arc<dyn Transport>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            counter_source_override: None,
            transport_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the counter source for testing.
    pub fn counter_source_override(mut self, source: Box<dyn CounterSource>) -> Self {
        self.counter_source_override = Some(source);
        self
    }

    /// Overrides the output transport for testing.
    pub fn transport_override(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Attaches to the monitored process and starts sampling.
    ///
    /// Fails if the process cannot be attached; nothing keeps running then.
    /// The sampling loop stops when `shutdown_rx` fires.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let (background_shutdown_tx, background_shutdown_rx) = watch::channel(false);
        let task_manager = TaskManager::new(background_shutdown_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let (metrics, metrics_addr) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(&task_manager),
        };
        let metrics = Arc::new(metrics);

        // =========================================================================
        // 2. Transport
        // =========================================================================
        let transport = match self.transport_override {
            Some(transport) => transport,
            None => {
                match build_transport(&config.output, &config.application, metrics.clone()) {
                    Ok(transport) => transport,
                    Err(e) => {
                        shutdown_background(background_shutdown_tx, task_manager).await;
                        return Err(e).context("failed to initialize output transport");
                    }
                }
            }
        };

        // =========================================================================
        // 3. Attach
        // =========================================================================
        let source: Result<Box<dyn CounterSource>> = match self.counter_source_override {
            Some(source) => Ok(source),
            None => JolokiaSource::from_config(&config.target)
                .map(|source| Box::new(source) as Box<dyn CounterSource>)
                .map_err(Into::into),
        };
        info!(
            url = config.target.url.as_deref().unwrap_or("<override>"),
            pid = ?config.target.pid,
            "Attaching to monitored process"
        );
        let mut sampler = match source {
            Ok(source) => Sampler::new(source),
            Err(e) => {
                transport.close().await;
                shutdown_background(background_shutdown_tx, task_manager).await;
                return Err(e).context("failed to create counter source");
            }
        };
        if let Err(e) = sampler.attach().await {
            transport.close().await;
            shutdown_background(background_shutdown_tx, task_manager).await;
            return Err(e.into());
        }
        metrics.set_attached(true);

        // =========================================================================
        // 4. Sampling loop
        // =========================================================================
        let monitor = Monitor::new(
            sampler,
            transport.clone(),
            Duration::from_secs(config.monitor.interval_seconds),
            metrics,
        );
        let monitor = tokio::spawn(monitor.run(shutdown_rx));

        info!("jvmwatch initialized successfully. Sampling...");

        Ok(App {
            monitor,
            transport,
            task_manager,
            background_shutdown_tx,
            metrics_addr,
        })
    }
}

async fn shutdown_background(tx: watch::Sender<bool>, task_manager: TaskManager) {
    // Nobody may be listening when metrics are disabled.
    let _ = tx.send(true);
    task_manager.shutdown().await;
}
