//! Attach/detach lifecycle and one-cycle sampling.
//!
//! A [`Sampler`] owns its counter source and the most recent snapshot. The
//! snapshot is only replaced at the end of a successful cycle; a failed read
//! drops the sampler back to detached and discards it.

use crate::core::{CounterSource, RawCounters, Snapshot};
use crate::rates;
use crate::source::SourceError;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SamplerError {
    /// The counter source could not be attached.
    #[error("unable to attach to the monitored process: {0}")]
    Connection(#[source] SourceError),

    /// A read failed after a successful attach. The sampler is now detached.
    #[error("connection to the monitored process lost: {0}")]
    ConnectionLost(#[source] SourceError),

    #[error("sampler is not attached")]
    NotAttached,

    #[error("sampler is already attached")]
    AlreadyAttached,

    #[error("sampler has been detached; create a new sampler to attach again")]
    Retired,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Detached,
    Attached,
}

#[derive(Debug)]
enum Session {
    /// Never attached.
    Fresh,
    Attached { last: Snapshot },
    /// Detached after a session; the sampler cannot attach again.
    Ended,
}

/// Samples one process through a [`CounterSource`].
pub struct Sampler {
    source: Box<dyn CounterSource>,
    session: Session,
}

impl Sampler {
    /// Creates a detached sampler.
    pub fn new(source: Box<dyn CounterSource>) -> Self {
        Self {
            source,
            session: Session::Fresh,
        }
    }

    pub fn state(&self) -> SamplerState {
        match self.session {
            Session::Attached { .. } => SamplerState::Attached,
            Session::Fresh | Session::Ended => SamplerState::Detached,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state() == SamplerState::Attached
    }

    /// The snapshot the next delta will be computed against.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        match &self.session {
            Session::Attached { last } => Some(last),
            _ => None,
        }
    }

    /// Connects the source and takes the zero-load baseline snapshot.
    ///
    /// On failure the sampler stays detached and may be attached again.
    pub async fn attach(&mut self) -> Result<Snapshot, SamplerError> {
        match self.session {
            Session::Fresh => {}
            Session::Attached { .. } => return Err(SamplerError::AlreadyAttached),
            Session::Ended => return Err(SamplerError::Retired),
        }

        self.source
            .connect()
            .await
            .map_err(SamplerError::Connection)?;

        let counters = match self.source.read().await {
            Ok(counters) => counters,
            Err(e) => {
                warn!(error = %e, "Initial counter read failed, releasing source");
                self.release().await;
                return Err(SamplerError::Connection(e));
            }
        };

        let baseline = next_snapshot(None, counters);
        info!(
            host = %baseline.host_identity,
            detailed_gc = baseline.gc_accounting.is_detailed(),
            "Attached, baseline snapshot taken"
        );
        self.session = Session::Attached {
            last: baseline.clone(),
        };
        Ok(baseline)
    }

    /// Reads the source and derives a new snapshot from the previous one.
    ///
    /// A failed read detaches the sampler and returns
    /// [`SamplerError::ConnectionLost`]; callers must stop sampling then.
    pub async fn sample(&mut self) -> Result<Snapshot, SamplerError> {
        if !self.is_attached() {
            return Err(SamplerError::NotAttached);
        }

        let counters = match self.source.read().await {
            Ok(counters) => counters,
            Err(e) => {
                warn!(error = %e, "Counter read failed, detaching");
                self.release().await;
                self.session = Session::Ended;
                return Err(SamplerError::ConnectionLost(e));
            }
        };

        let snapshot = match &self.session {
            Session::Attached { last } => next_snapshot(Some(last), counters),
            _ => return Err(SamplerError::NotAttached),
        };
        debug!(
            cpu_load = snapshot.cpu_load,
            gc_load = snapshot.gc_accounting.load(),
            "Sampled"
        );
        self.session = Session::Attached {
            last: snapshot.clone(),
        };
        Ok(snapshot)
    }

    /// Releases the source and moves to detached. Safe to call in any state.
    pub async fn detach(&mut self) {
        if self.is_attached() {
            info!("Detaching from monitored process");
        }
        self.release().await;
        self.session = Session::Ended;
    }

    async fn release(&mut self) {
        if let Err(e) = self.source.disconnect().await {
            debug!(error = %e, "Ignoring error while releasing counter source");
        }
    }
}

/// Builds the snapshot for `counters`, diffing against `previous` when there is one.
///
/// Without a previous snapshot every rate is zero and cumulative counters are
/// seeded from `counters`. The same holds per counter when the previous cycle
/// could not read it: a degraded cycle is never a delta baseline.
pub fn next_snapshot(previous: Option<&Snapshot>, counters: RawCounters) -> Snapshot {
    let (cpu_load, gc_accounting) = match previous {
        Some(previous) => {
            let elapsed = rates::elapsed_nanos(previous.sampled_at_nanos, counters.timestamp);
            let gc_baseline = Some(&previous.gc_accounting).filter(|_| previous.gc_readable);
            (
                rates::cpu_load(previous, &counters, elapsed),
                rates::gc_accounting(gc_baseline, counters.collectors.as_ref(), elapsed),
            )
        }
        None => (
            0.0,
            rates::gc_accounting(None, counters.collectors.as_ref(), 0),
        ),
    };

    Snapshot {
        sampled_at_nanos: counters.timestamp,
        cpu_load,
        gc_accounting,
        total_cpu_time_nanos: counters.total_cpu_time_nanos,
        gc_readable: counters.collectors.is_some(),
        heap: counters.heap,
        non_heap: counters.non_heap,
        loaded_classes: counters.loaded_class_count,
        thread_count: counters.thread_count,
        daemon_thread_count: counters.daemon_thread_count,
        host_identity: counters.host_identity,
    }
}
