//! A transport that buffers snapshots in a bounded queue.
//!
//! A writer task drains the queue, encodes each snapshot and hands the bytes
//! to a [`SnapshotSink`]. When the queue is full, `try_send` reports
//! backpressure instead of waiting, so a slow or unreachable destination
//! never stalls the sampling loop.

use crate::core::{Snapshot, Transport};
use crate::formatting::SnapshotEncoder;
use crate::internal_metrics::Metrics;
use crate::outputs::TransportError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Destination for encoded snapshots, driven by a single writer task.
#[async_trait]
pub trait SnapshotSink: Send + 'static {
    /// A short name for logging (e.g. "tcp").
    fn name(&self) -> &'static str;

    /// Delivers one encoded message.
    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

pub struct QueuedTransport {
    name: &'static str,
    queue: Mutex<Option<mpsc::Sender<Snapshot>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    drain_timeout: Duration,
}

impl QueuedTransport {
    /// Creates the queue and spawns the writer task feeding `sink`.
    pub fn start<S: SnapshotSink>(
        sink: S,
        encoder: SnapshotEncoder,
        queue_size: usize,
        drain_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let name = sink.name();
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let writer = tokio::spawn(run_writer(rx, sink, encoder, metrics));
        Self {
            name,
            queue: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            drain_timeout,
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Snapshot>> {
        self.queue.lock().ok().and_then(|queue| queue.clone())
    }
}

#[async_trait]
impl Transport for QueuedTransport {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        let sender = self.sender().ok_or(TransportError::Closed)?;
        sender
            .send(snapshot)
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn try_send(&self, snapshot: Snapshot) -> bool {
        match self.sender() {
            Some(sender) => sender.try_send(snapshot).is_ok(),
            None => false,
        }
    }

    async fn close(&self) {
        // Dropping the last sender ends the writer once the queue is drained.
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        let writer = self.writer.lock().ok().and_then(|mut writer| writer.take());
        if let Some(mut writer) = writer {
            if tokio::time::timeout(self.drain_timeout, &mut writer)
                .await
                .is_err()
            {
                warn!(
                    transport = self.name,
                    "Queue not drained within {:?}, discarding remaining snapshots",
                    self.drain_timeout
                );
                writer.abort();
            }
        }
    }
}

async fn run_writer<S: SnapshotSink>(
    mut rx: mpsc::Receiver<Snapshot>,
    mut sink: S,
    encoder: SnapshotEncoder,
    metrics: Arc<Metrics>,
) {
    debug!(sink = sink.name(), "Transport writer started");
    while let Some(snapshot) = rx.recv().await {
        let payload = match encoder.encode(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                error!(sink = sink.name(), error = %e, "Failed to encode snapshot");
                metrics.transport_send_failures_total.increment(1);
                continue;
            }
        };
        if let Err(e) = sink.write(&payload).await {
            warn!(sink = sink.name(), error = %e, "Failed to deliver snapshot, discarding it");
            metrics.transport_send_failures_total.increment(1);
        }
    }
    debug!(sink = sink.name(), "Transport queue closed, writer finished");
}
