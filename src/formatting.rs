// src/formatting.rs

use crate::config::{ApplicationConfig, OutputFormat};
use crate::core::{GcAccounting, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

const GELF_VERSION: &str = "1.1";
const GELF_SHORT_MESSAGE: &str = "jvm-information";
/// Syslog severity "informational".
const GELF_LEVEL_INFO: u8 = 6;

/// A GELF 1.1 message carrying one snapshot as additional fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GelfMessage {
    pub version: &'static str,
    pub host: String,
    pub short_message: &'static str,
    /// Seconds since the Unix epoch, with millisecond precision.
    pub timestamp: f64,
    pub level: u8,
    #[serde(rename = "_application", skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(rename = "_deployment_unit", skip_serializing_if = "Option::is_none")]
    pub deployment_unit: Option<String>,
    #[serde(rename = "_cpu_load")]
    pub cpu_load: f64,
    #[serde(rename = "_thread_count")]
    pub thread_count: u64,
    #[serde(rename = "_daemon_thread_count")]
    pub daemon_thread_count: u64,
    #[serde(rename = "_gc_load")]
    pub gc_load: f64,
    #[serde(rename = "_gc_count")]
    pub gc_count: u64,
    #[serde(flatten)]
    pub generations: Option<GelfGenerations>,
    #[serde(rename = "_heap_max")]
    pub heap_max: u64,
    #[serde(rename = "_heap_size")]
    pub heap_size: u64,
    #[serde(rename = "_heap_used")]
    pub heap_used: u64,
    #[serde(rename = "_loaded_classes")]
    pub loaded_classes: u64,
    #[serde(rename = "_non_heap_max")]
    pub non_heap_max: u64,
    #[serde(rename = "_non_heap_size")]
    pub non_heap_size: u64,
    #[serde(rename = "_non_heap_used")]
    pub non_heap_used: u64,
}

/// Per-generation fields, only present under detailed accounting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GelfGenerations {
    #[serde(rename = "_gc_young_gen_load")]
    pub young_load: f64,
    #[serde(rename = "_gc_young_gen_count")]
    pub young_count: u64,
    #[serde(rename = "_gc_young_gen_collectors")]
    pub young_collectors: String,
    #[serde(rename = "_gc_old_gen_load")]
    pub old_load: f64,
    #[serde(rename = "_gc_old_gen_count")]
    pub old_count: u64,
    #[serde(rename = "_gc_old_gen_collectors")]
    pub old_collectors: String,
}

impl GelfMessage {
    pub fn from_snapshot(
        snapshot: &Snapshot,
        labels: &ApplicationConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let totals = snapshot.gc_accounting.totals();
        // Counts are per-cycle deltas, matching the loads next to them.
        let generations = match &snapshot.gc_accounting {
            GcAccounting::Detailed(detailed) => Some(GelfGenerations {
                young_load: detailed.young.load,
                young_count: detailed.young.delta_count,
                young_collectors: detailed.young.collectors.join(", "),
                old_load: detailed.old.load,
                old_count: detailed.old.delta_count,
                old_collectors: detailed.old.collectors.join(", "),
            }),
            GcAccounting::Basic(_) => None,
        };

        Self {
            version: GELF_VERSION,
            host: snapshot.host_identity.clone(),
            short_message: GELF_SHORT_MESSAGE,
            timestamp: now.timestamp_millis() as f64 / 1000.0,
            level: GELF_LEVEL_INFO,
            application: labels.name.clone(),
            deployment_unit: labels.deployment_unit.clone(),
            cpu_load: snapshot.cpu_load,
            thread_count: snapshot.thread_count,
            daemon_thread_count: snapshot.daemon_thread_count,
            gc_load: totals.load,
            gc_count: totals.delta_count,
            generations,
            heap_max: snapshot.heap.max,
            heap_size: snapshot.heap.committed,
            heap_used: snapshot.heap.used,
            loaded_classes: snapshot.loaded_classes,
            non_heap_max: snapshot.non_heap.max,
            non_heap_size: snapshot.non_heap.committed,
            non_heap_used: snapshot.non_heap.used,
        }
    }
}

/// The plain structured form: the snapshot's own fields plus labels.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    emitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment_unit: Option<&'a str>,
}

/// Turns snapshots into the bytes a transport puts on the wire.
#[derive(Debug, Clone)]
pub struct SnapshotEncoder {
    format: OutputFormat,
    labels: ApplicationConfig,
}

impl SnapshotEncoder {
    pub fn new(format: OutputFormat, labels: ApplicationConfig) -> Self {
        Self { format, labels }
    }

    /// Encodes `snapshot` as a single JSON document stamped with the current time.
    pub fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
        self.encode_at(snapshot, Utc::now())
    }

    pub fn encode_at(
        &self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, serde_json::Error> {
        match self.format {
            OutputFormat::Gelf => {
                serde_json::to_vec(&GelfMessage::from_snapshot(snapshot, &self.labels, now))
            }
            OutputFormat::Json => serde_json::to_vec(&SnapshotRecord {
                snapshot,
                emitted_at: now.to_rfc3339(),
                application: self.labels.name.as_deref(),
                deployment_unit: self.labels.deployment_unit.as_deref(),
            }),
        }
    }
}
