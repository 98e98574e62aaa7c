//! The sampling loop.
//!
//! Samples on a fixed interval and offers each snapshot to the transport
//! without waiting. A rejected snapshot is dropped; the next one is taken on
//! schedule.

use crate::core::{Snapshot, Transport};
use crate::internal_metrics::Metrics;
use crate::sampler::{Sampler, SamplerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Why the sampling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Shutdown was requested.
    Shutdown,
    /// The monitored process went away.
    ConnectionLost,
}

pub struct Monitor {
    sampler: Sampler,
    transport: Arc<dyn Transport>,
    interval: Duration,
    metrics: Arc<Metrics>,
}

impl Monitor {
    /// `sampler` should already be attached; its baseline is the first delta's origin.
    pub fn new(
        sampler: Sampler,
        transport: Arc<dyn Transport>,
        interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sampler,
            transport,
            interval,
            metrics,
        }
    }

    /// Runs until shutdown is signalled or the connection is lost, then detaches.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> MonitorExit {
        // A slow read delays the following ticks instead of bursting to catch up.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval = ?self.interval,
            transport = self.transport.name(),
            "Sampling started"
        );

        let exit = loop {
            tokio::select! {
                biased;
                // A dropped sender is not a shutdown request.
                Ok(()) = shutdown_rx.changed() => {
                    info!("Monitor received shutdown signal.");
                    break MonitorExit::Shutdown;
                }
                _ = ticker.tick() => {
                    match self.sampler.sample().await {
                        Ok(snapshot) => self.dispatch(snapshot),
                        Err(SamplerError::ConnectionLost(e)) => {
                            error!(error = %e, "Lost connection to the monitored process");
                            break MonitorExit::ConnectionLost;
                        }
                        Err(e) => {
                            error!(error = %e, "Sampling stopped");
                            break MonitorExit::ConnectionLost;
                        }
                    }
                }
            }
        };

        self.sampler.detach().await;
        self.metrics.set_attached(false);
        exit
    }

    fn dispatch(&self, snapshot: Snapshot) {
        self.metrics.record_snapshot(&snapshot);
        if !self.transport.try_send(snapshot) {
            warn!(
                transport = self.transport.name(),
                "Transport is applying backpressure, snapshot dropped"
            );
            self.metrics.snapshots_dropped_total.increment(1);
        }
    }
}
