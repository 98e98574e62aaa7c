//! Core domain types and service traits for jvmwatch
//!
//! This module defines the counter model read from a monitored process, the
//! snapshot derived from it, and the trait contracts for the two external
//! collaborators: the counter source and the outbound transport.

use crate::outputs::TransportError;
use crate::source::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Host identity used when the source cannot report one.
pub const UNKNOWN_HOST: &str = "<unknown>";

/// Cumulative counters of a single garbage collector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CollectorCounters {
    /// Number of collections since process start.
    pub collection_count: u64,
    /// Time spent collecting since process start, in nanoseconds.
    pub collection_time_nanos: u64,
}

/// Committed/used/max figures of a memory pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub committed: u64,
    pub used: u64,
    pub max: u64,
}

/// An instantaneous read from a [`CounterSource`].
///
/// Every field has a zero/empty default so a source can degrade a single
/// counter without failing the whole read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCounters {
    /// Monotonic clock reading in nanoseconds. Not wall-clock time.
    pub timestamp: u64,
    /// Cumulative processor time. `None` when the source could not read it.
    pub total_cpu_time_nanos: Option<u64>,
    /// Per-collector counters keyed by collector name. `None` when the source
    /// could not supply any collector information.
    pub collectors: Option<BTreeMap<String, CollectorCounters>>,
    pub heap: MemoryUsage,
    pub non_heap: MemoryUsage,
    pub loaded_class_count: u64,
    pub thread_count: u64,
    pub daemon_thread_count: u64,
    pub host_identity: String,
}

impl RawCounters {
    /// Returns a read with every counter at its default and an unknown host.
    pub fn empty(timestamp: u64) -> Self {
        Self {
            timestamp,
            host_identity: UNKNOWN_HOST.to_string(),
            ..Default::default()
        }
    }
}

/// Overall garbage-collection figures, present in both accounting variants.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GcTotals {
    /// Cumulative collection count.
    pub total_count: u64,
    /// Cumulative collection time in nanoseconds.
    pub total_time_nanos: u64,
    /// Collections since the previous sample.
    pub delta_count: u64,
    /// Fraction of elapsed time spent collecting since the previous sample.
    pub load: f64,
}

/// Figures for one generation (young or old) under detailed accounting.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationGc {
    /// Collector names belonging to this generation, in read order.
    pub collectors: Vec<String>,
    pub count: u64,
    pub delta_count: u64,
    pub time_nanos: u64,
    pub load: f64,
}

/// Per-generation breakdown, only produced when every collector is classified.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetailedGc {
    #[serde(flatten)]
    pub totals: GcTotals,
    pub young: GenerationGc,
    pub old: GenerationGc,
}

/// Garbage-collection accounting for one sampling cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GcAccounting {
    Basic(GcTotals),
    Detailed(DetailedGc),
}

impl GcAccounting {
    /// Accounting used when the source supplied no collector information.
    pub fn unavailable() -> Self {
        GcAccounting::Basic(GcTotals::default())
    }

    pub fn totals(&self) -> &GcTotals {
        match self {
            GcAccounting::Basic(totals) => totals,
            GcAccounting::Detailed(detailed) => &detailed.totals,
        }
    }

    pub fn load(&self) -> f64 {
        self.totals().load
    }

    pub fn is_detailed(&self) -> bool {
        matches!(self, GcAccounting::Detailed(_))
    }
}

/// The output record of one sampling cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Monotonic timestamp of the read this snapshot was built from.
    pub sampled_at_nanos: u64,
    pub cpu_load: f64,
    pub gc_accounting: GcAccounting,
    /// Cumulative processor time, carried for the next delta. `None` when
    /// unreadable; the next readable cycle then starts a fresh baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cpu_time_nanos: Option<u64>,
    /// Whether `gc_accounting` was built from collector counters. An
    /// unavailable cycle is never used as the baseline for a GC delta.
    #[serde(skip)]
    pub gc_readable: bool,
    pub heap: MemoryUsage,
    pub non_heap: MemoryUsage,
    pub loaded_classes: u64,
    pub thread_count: u64,
    pub daemon_thread_count: u64,
    pub host_identity: String,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Supplies raw counters of a monitored process.
#[async_trait]
pub trait CounterSource: Send {
    /// Establishes the management connection.
    ///
    /// # Returns
    /// * `Err(SourceError::Connect)` if the target refuses or cannot be found
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Reads the current counters.
    ///
    /// Individual counters that cannot be read are defaulted. An error means
    /// the connection itself is gone.
    async fn read(&mut self) -> Result<RawCounters, SourceError>;

    /// Releases the connection. Calling it more than once is allowed.
    async fn disconnect(&mut self) -> Result<(), SourceError>;
}

/// Delivers finished snapshots to an output destination.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A short, descriptive name (e.g. "stdout", "tcp"), used for logging.
    fn name(&self) -> &str;

    /// Hands a snapshot over, waiting briefly for room if necessary.
    async fn send(&self, snapshot: Snapshot) -> Result<(), TransportError>;

    /// Hands a snapshot over without waiting.
    ///
    /// # Returns
    /// * `true` if the snapshot was accepted
    /// * `false` if the transport applied backpressure; the snapshot is dropped
    fn try_send(&self, snapshot: Snapshot) -> bool;

    /// Stops accepting snapshots and flushes what was already accepted.
    async fn close(&self);
}
