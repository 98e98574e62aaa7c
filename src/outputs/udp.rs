use crate::outputs::{SnapshotSink, TransportError};
use async_trait::async_trait;
use std::io;
use tokio::net::UdpSocket;
use tracing::info;

/// Largest payload sent as a single unchunked GELF datagram.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// GELF over UDP: one message per datagram.
pub struct UdpSink {
    host: String,
    port: u16,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            socket: None,
        }
    }

    async fn bind(&self) -> Result<UdpSocket, TransportError> {
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", self.host))
            })?;
        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        info!(%addr, "Sending GELF datagrams");
        Ok(socket)
    }
}

#[async_trait]
impl SnapshotSink for UdpSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::Oversize(payload.len()));
        }
        if self.socket.is_none() {
            self.socket = Some(self.bind().await?);
        }
        if let Some(socket) = &self.socket {
            if let Err(e) = socket.send(payload).await {
                // Rebind on the next write; ICMP errors can poison a connected socket.
                self.socket = None;
                return Err(TransportError::Io(e));
            }
        }
        Ok(())
    }
}
