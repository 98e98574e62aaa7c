#![allow(dead_code)]
//! Test helpers for running the full application instance.

use crate::helpers::mock_transport::RecordingTransport;
use anyhow::Result;
use jvmwatch::{
    app::AppBuilder,
    config::Config,
    core::Transport,
    internal_metrics::Metrics,
    monitor::MonitorExit,
    source::test_utils::FakeCounterSource,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application.
#[derive(Debug)]
pub struct TestApp {
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: JoinHandle<Result<MonitorExit>>,
    pub metrics_addr: Option<SocketAddr>,
}

impl TestApp {
    /// Signals shutdown and waits for the application to terminate.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<MonitorExit> {
        self.shutdown_tx
            .send(true)
            .expect("Failed to send shutdown signal");
        self.join(timeout_duration).await
    }

    /// Waits for the application to stop on its own.
    pub async fn join(self, timeout_duration: Duration) -> Result<MonitorExit> {
        match timeout(timeout_duration, self.app_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(anyhow::anyhow!("App failed to stop within the timeout")),
        }
    }
}

/// A builder for `TestApp` instances backed by fakes.
pub struct TestAppBuilder {
    pub config: Config,
    source: FakeCounterSource,
    transport: Arc<dyn Transport>,
    metrics: Option<Metrics>,
}

impl TestAppBuilder {
    pub fn new(source: FakeCounterSource) -> Self {
        let mut config = Config::default();
        config.monitor.interval_seconds = 1;
        Self {
            config,
            source,
            transport: Arc::new(RecordingTransport::new()),
            metrics: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    pub fn with_metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables the Prometheus endpoint on a random local port.
    pub fn with_metrics_server(mut self) -> Self {
        self.config.metrics.enabled = true;
        self.config.metrics.listen_address = "127.0.0.1:0".parse().unwrap();
        self
    }

    /// Builds (attaches) and spawns the application.
    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut builder = AppBuilder::new(self.config)
            .counter_source_override(Box::new(self.source))
            .transport_override(self.transport);
        if let Some(metrics) = self.metrics {
            builder = builder.metrics_override(metrics);
        }

        let app = builder.build(shutdown_rx).await?;
        let metrics_addr = app.metrics_addr();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            shutdown_tx,
            app_handle,
            metrics_addr,
        })
    }
}
