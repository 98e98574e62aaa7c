//! GELF over TCP.
//!
//! Messages are framed by a trailing NUL byte. The connection is opened
//! lazily and re-established after `reconnect_delay` whenever a write fails.

use crate::config::OutputConfig;
use crate::internal_metrics::Metrics;
use crate::outputs::{SnapshotSink, TransportError};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, info, warn};

pub struct TcpSink {
    host: String,
    port: u16,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    no_delay: bool,
    send_buffer_size: u32,
    stream: Option<TcpStream>,
    /// Set after a failure; the next connect attempt waits `reconnect_delay` first.
    backoff: bool,
    metrics: Arc<Metrics>,
}

impl TcpSink {
    pub fn new(host: String, port: u16, config: &OutputConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            host,
            port,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            no_delay: config.tcp_no_delay,
            send_buffer_size: config.send_buffer_size,
            stream: None,
            backoff: false,
            metrics,
        }
    }

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let mut last_error =
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", self.host));

        for addr in tokio::net::lookup_host((self.host.as_str(), self.port)).await? {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_send_buffer_size(self.send_buffer_size)?;

            match tokio::time::timeout(self.connect_timeout, socket.connect(addr)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(self.no_delay)?;
                    return Ok(stream);
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => {
                    last_error = io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {addr} timed out after {:?}", self.connect_timeout),
                    )
                }
            }
        }
        Err(TransportError::Io(last_error))
    }

    async fn ensure_connected(&mut self) -> Result<&mut TcpStream, TransportError> {
        if self.stream.is_none() {
            if self.backoff {
                tokio::time::sleep(self.reconnect_delay).await;
                self.metrics.transport_reconnects_total.increment(1);
            }
            match self.connect().await {
                Ok(stream) => {
                    info!(host = %self.host, port = self.port, "Connected to GELF TCP input");
                    self.backoff = false;
                    self.stream = Some(stream);
                }
                Err(e) => {
                    self.backoff = true;
                    return Err(e);
                }
            }
        }
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Io(io::Error::from(io::ErrorKind::NotConnected)))
    }
}

#[async_trait]
impl SnapshotSink for TcpSink {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(0);

        let stream = self.ensure_connected().await?;
        if let Err(e) = stream.write_all(&frame).await {
            warn!(host = %self.host, port = self.port, error = %e, "TCP connection lost");
            self.stream = None;
            self.backoff = true;
            return Err(TransportError::Io(e));
        }
        debug!(bytes = frame.len(), "Sent GELF frame");
        Ok(())
    }
}
