use crate::core::{CollectorCounters, CounterSource, RawCounters};
use crate::source::SourceError;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted counter source for testing.
///
/// Reads pop the front of the script. Once the script is empty, reads fail
/// with [`SourceError::Read`] unless the source was built with [`steady`],
/// in which case it synthesizes ever-increasing counters.
///
/// Clones share their state, so a test can keep a handle after boxing one
/// into a sampler.
///
/// [`steady`]: FakeCounterSource::steady
#[derive(Clone, Default)]
pub struct FakeCounterSource {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    script: VecDeque<Result<RawCounters, SourceError>>,
    connect_error: Option<SourceError>,
    disconnect_error: Option<SourceError>,
    steady: bool,
    connected: bool,
    connects: usize,
    reads: usize,
    disconnects: usize,
}

impl FakeCounterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that never runs out of reads.
    pub fn steady() -> Self {
        let source = Self::default();
        source.state.lock().unwrap().steady = true;
        source
    }

    /// Queues a successful read.
    pub fn push_counters(&self, counters: RawCounters) {
        self.state.lock().unwrap().script.push_back(Ok(counters));
    }

    /// Queues a failing read.
    pub fn push_read_error(&self, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Err(SourceError::Read(reason.to_string())));
    }

    /// Makes every `connect` fail.
    pub fn fail_connect(&self, reason: &str) {
        self.state.lock().unwrap().connect_error = Some(SourceError::Connect {
            target: "fake".to_string(),
            reason: reason.to_string(),
        });
    }

    /// Makes every `disconnect` fail.
    pub fn fail_disconnect(&self, reason: &str) {
        self.state.lock().unwrap().disconnect_error = Some(SourceError::Read(reason.to_string()));
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }
}

#[async_trait]
impl CounterSource for FakeCounterSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if let Some(e) = &state.connect_error {
            return Err(e.clone());
        }
        state.connected = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<RawCounters, SourceError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(SourceError::NotConnected);
        }
        state.reads += 1;
        match state.script.pop_front() {
            Some(response) => response,
            None if state.steady => Ok(steady_counters(state.reads as u64)),
            None => Err(SourceError::Read("no more scripted reads".to_string())),
        }
    }

    async fn disconnect(&mut self) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        state.connected = false;
        match &state.disconnect_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Counters for the `n`-th read: one second apart, half a core busy, a G1 pair.
pub fn steady_counters(n: u64) -> RawCounters {
    let mut counters = RawCounters::empty(n * 1_000_000_000);
    counters.total_cpu_time_nanos = Some(n * 500_000_000);
    counters.host_identity = "fake-host".to_string();
    counters.thread_count = 12;
    counters.collectors = Some(BTreeMap::from([
        (
            "G1 Young Generation".to_string(),
            CollectorCounters {
                collection_count: n,
                collection_time_nanos: n * 10_000_000,
            },
        ),
        (
            "G1 Old Generation".to_string(),
            CollectorCounters {
                collection_count: 0,
                collection_time_nanos: 0,
            },
        ),
    ]));
    counters
}
