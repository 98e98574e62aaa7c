#![allow(dead_code)]
use async_trait::async_trait;
use jvmwatch::core::{Snapshot, Transport};
use jvmwatch::outputs::TransportError;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::sync::Notify;

/// A transport that accepts and keeps every snapshot.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub snapshots: Arc<Mutex<Vec<Snapshot>>>,
    pub notifier: Arc<Notify>,
    pub closed: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn wait_for_count(&self, target_count: usize, timeout_duration: std::time::Duration) {
        let wait_future = async {
            while self.count() < target_count {
                self.notifier.notified().await;
            }
        };

        tokio::time::timeout(timeout_duration, wait_future)
            .await
            .expect("Timed out waiting for snapshots");
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn send(&self, snapshot: Snapshot) -> Result<(), TransportError> {
        if self.try_send(snapshot) {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    fn try_send(&self, snapshot: Snapshot) -> bool {
        if self.is_closed() {
            return false;
        }
        self.snapshots.lock().unwrap().push(snapshot);
        self.notifier.notify_one();
        true
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A transport whose queue is always full: it counts offers and keeps nothing.
#[derive(Clone, Debug, Default)]
pub struct RejectingTransport {
    pub attempts: Arc<AtomicUsize>,
}

impl RejectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RejectingTransport {
    fn name(&self) -> &str {
        "rejecting_mock"
    }

    async fn send(&self, _snapshot: Snapshot) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Closed)
    }

    fn try_send(&self, _snapshot: Snapshot) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        false
    }

    async fn close(&self) {}
}
