#![allow(dead_code)]
//! Builders for raw counter reads.

use jvmwatch::core::{CollectorCounters, RawCounters};
use std::collections::BTreeMap;

/// A read at `timestamp` with `cpu_nanos` of processor time and no GC information.
pub fn counters(timestamp: u64, cpu_nanos: u64) -> RawCounters {
    let mut counters = RawCounters::empty(timestamp);
    counters.total_cpu_time_nanos = Some(cpu_nanos);
    counters.host_identity = "test-host".to_string();
    counters
}

/// Like [`counters`], with `(name, count, time_nanos)` per collector.
pub fn counters_with_gc(
    timestamp: u64,
    cpu_nanos: u64,
    collectors: &[(&str, u64, u64)],
) -> RawCounters {
    let mut counters = counters(timestamp, cpu_nanos);
    counters.collectors = Some(collector_map(collectors));
    counters
}

pub fn collector_map(collectors: &[(&str, u64, u64)]) -> BTreeMap<String, CollectorCounters> {
    collectors
        .iter()
        .map(|(name, count, time)| {
            (
                name.to_string(),
                CollectorCounters {
                    collection_count: *count,
                    collection_time_nanos: *time,
                },
            )
        })
        .collect()
}
