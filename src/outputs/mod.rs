//! Output transports and target selection
//!
//! This module implements the transports snapshots are delivered through
//! (stdout, GELF over TCP, GELF over UDP) and builds the right one from the
//! configured target URL.

pub mod queued;
pub mod stdout;
pub mod tcp;
pub mod udp;

use crate::config::{ApplicationConfig, OutputConfig};
use crate::core::Transport;
use crate::formatting::SnapshotEncoder;
use crate::internal_metrics::Metrics;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use queued::{QueuedTransport, SnapshotSink};
pub use stdout::StdoutTransport;
pub use tcp::TcpSink;
pub use udp::UdpSink;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid output target '{0}' (expected tcp://host:port, udp://host:port or stdout://)")]
    InvalidTarget(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("payload of {0} bytes exceeds the datagram size limit")]
    Oversize(usize),

    #[error("transport is closed")]
    Closed,
}

/// A parsed output target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Tcp { host: String, port: u16 },
    Udp { host: String, port: u16 },
    Stdout,
}

impl FromStr for TransportTarget {
    type Err = TransportError;

    fn from_str(target: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidTarget(target.to_string());

        if target.starts_with("stdout://") {
            return Ok(TransportTarget::Stdout);
        }

        let (scheme, endpoint) = target.split_once("://").ok_or_else(invalid)?;
        let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }

        match scheme {
            "tcp" => Ok(TransportTarget::Tcp {
                host: host.to_string(),
                port,
            }),
            "udp" => Ok(TransportTarget::Udp {
                host: host.to_string(),
                port,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportTarget::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            TransportTarget::Udp { host, port } => write!(f, "udp://{host}:{port}"),
            TransportTarget::Stdout => write!(f, "stdout://"),
        }
    }
}

/// Builds the transport selected by `config.target`.
///
/// Network transports spawn their writer task and therefore need a Tokio runtime.
pub fn build_transport(
    config: &OutputConfig,
    labels: &ApplicationConfig,
    metrics: Arc<Metrics>,
) -> Result<Arc<dyn Transport>, TransportError> {
    let target = TransportTarget::from_str(&config.target)?;
    let encoder = SnapshotEncoder::new(config.format.clone(), labels.clone());
    let drain_timeout = Duration::from_millis(config.connect_timeout_ms);
    info!(%target, format = %config.format, "Initializing transport");

    let transport: Arc<dyn Transport> = match target {
        TransportTarget::Stdout => Arc::new(StdoutTransport::new(encoder)),
        TransportTarget::Tcp { host, port } => {
            let sink = TcpSink::new(host, port, config, metrics.clone());
            Arc::new(QueuedTransport::start(
                sink,
                encoder,
                config.queue_size,
                drain_timeout,
                metrics,
            ))
        }
        TransportTarget::Udp { host, port } => {
            let sink = UdpSink::new(host, port);
            Arc::new(QueuedTransport::start(
                sink,
                encoder,
                config.queue_size,
                drain_timeout,
                metrics,
            ))
        }
    };
    Ok(transport)
}
