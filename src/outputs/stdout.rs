use crate::core::{Snapshot, Transport};
use crate::formatting::SnapshotEncoder;
use crate::outputs::TransportError;
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Writes one encoded snapshot per line to standard output.
///
/// Writing is synchronous, so the transport never applies backpressure.
pub struct StdoutTransport {
    encoder: SnapshotEncoder,
    closed: AtomicBool,
}

impl StdoutTransport {
    pub fn new(encoder: SnapshotEncoder) -> Self {
        Self {
            encoder,
            closed: AtomicBool::new(false),
        }
    }

    fn write_line(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let line = self.encoder.encode(snapshot)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&line)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        self.write_line(&snapshot)
    }

    fn try_send(&self, snapshot: Snapshot) -> bool {
        match self.write_line(&snapshot) {
            Ok(()) => true,
            Err(TransportError::Closed) => false,
            Err(e) => {
                // Accepted but lost; not a backpressure condition.
                error!(error = %e, "Failed to write snapshot to stdout");
                true
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
