//! Derivation of utilization ratios from cumulative counters.
//!
//! Every load is `(current - previous) / elapsed`, clamped at zero. Counters
//! can go backwards (a reset, clock skew, a restarted process behind the same
//! endpoint); such cycles report zero instead of failing.

use crate::core::{
    CollectorCounters, DetailedGc, GcAccounting, GcTotals, GenerationGc, RawCounters, Snapshot,
};
use crate::gc::{classify, Classification};
use std::collections::BTreeMap;

/// Monotonic time elapsed between two samples, in nanoseconds. May be zero or negative.
pub fn elapsed_nanos(previous: u64, current: u64) -> i128 {
    i128::from(current) - i128::from(previous)
}

/// Ratio of counter growth to elapsed time.
///
/// Returns 0 when `delta_time_nanos <= 0` or when the counter went backwards.
pub fn load(previous: u64, current: u64, delta_time_nanos: i128) -> f64 {
    if delta_time_nanos <= 0 {
        return 0.0;
    }
    let delta = i128::from(current) - i128::from(previous);
    let load = delta as f64 / delta_time_nanos as f64;
    if load.is_finite() && load > 0.0 {
        load
    } else {
        0.0
    }
}

/// Processor load between the previous snapshot and a fresh read.
///
/// Zero when either side could not read the processor time.
pub fn cpu_load(previous: &Snapshot, current: &RawCounters, delta_time_nanos: i128) -> f64 {
    match (previous.total_cpu_time_nanos, current.total_cpu_time_nanos) {
        (Some(previous), Some(current)) => load(previous, current, delta_time_nanos),
        _ => 0.0,
    }
}

/// Builds the garbage-collection accounting for one cycle.
///
/// `previous` is `None` for the first sample of a session, or when the previous
/// cycle had no collector information. All deltas and loads are then zero and
/// the cumulative figures are seeded from `collectors`.
pub fn gc_accounting(
    previous: Option<&GcAccounting>,
    collectors: Option<&BTreeMap<String, CollectorCounters>>,
    delta_time_nanos: i128,
) -> GcAccounting {
    let Some(collectors) = collectors else {
        return GcAccounting::unavailable();
    };

    let classification = classify(collectors.keys().map(String::as_str));
    if !classification.is_detailed {
        return GcAccounting::Basic(basic_gc(
            previous.map(GcAccounting::totals),
            collectors,
            delta_time_nanos,
        ));
    }

    match previous {
        Some(GcAccounting::Detailed(previous)) => GcAccounting::Detailed(detailed_gc(
            previous,
            collectors,
            classification,
            delta_time_nanos,
        )),
        // First sample, or the previous cycle was basic: start a fresh detailed baseline.
        _ => GcAccounting::Detailed(detailed_baseline(collectors, classification)),
    }
}

/// Basic accounting: one delta over the summed time of all collectors.
pub fn basic_gc(
    previous: Option<&GcTotals>,
    collectors: &BTreeMap<String, CollectorCounters>,
    delta_time_nanos: i128,
) -> GcTotals {
    let (total_count, total_time_nanos) = sum_counters(collectors.values());

    match previous {
        Some(previous) => GcTotals {
            total_count,
            total_time_nanos,
            delta_count: u64::saturating_sub(total_count, previous.total_count),
            load: load(previous.total_time_nanos, total_time_nanos, delta_time_nanos),
        },
        None => GcTotals {
            total_count,
            total_time_nanos,
            ..Default::default()
        },
    }
}

/// Detailed accounting against the previous detailed cycle.
pub fn detailed_gc(
    previous: &DetailedGc,
    collectors: &BTreeMap<String, CollectorCounters>,
    classification: Classification,
    delta_time_nanos: i128,
) -> DetailedGc {
    let young = generation(
        collectors,
        classification.young,
        Some(&previous.young),
        delta_time_nanos,
    );
    let old = generation(
        collectors,
        classification.old,
        Some(&previous.old),
        delta_time_nanos,
    );

    // Counts are summed with counts, times with times.
    let total_count = young.count.saturating_add(old.count);
    let total_time_nanos = young.time_nanos.saturating_add(old.time_nanos);

    DetailedGc {
        totals: GcTotals {
            total_count,
            total_time_nanos,
            delta_count: u64::saturating_sub(total_count, previous.totals.total_count),
            load: load(
                previous.totals.total_time_nanos,
                total_time_nanos,
                delta_time_nanos,
            ),
        },
        young,
        old,
    }
}

fn detailed_baseline(
    collectors: &BTreeMap<String, CollectorCounters>,
    classification: Classification,
) -> DetailedGc {
    let young = generation(collectors, classification.young, None, 0);
    let old = generation(collectors, classification.old, None, 0);
    DetailedGc {
        totals: GcTotals {
            total_count: young.count.saturating_add(old.count),
            total_time_nanos: young.time_nanos.saturating_add(old.time_nanos),
            ..Default::default()
        },
        young,
        old,
    }
}

fn generation(
    collectors: &BTreeMap<String, CollectorCounters>,
    names: Vec<String>,
    previous: Option<&GenerationGc>,
    delta_time_nanos: i128,
) -> GenerationGc {
    let (count, time_nanos) = sum_counters(names.iter().filter_map(|name| collectors.get(name)));

    let (delta_count, load) = match previous {
        Some(previous) => (
            u64::saturating_sub(count, previous.count),
            load(previous.time_nanos, time_nanos, delta_time_nanos),
        ),
        None => (0, 0.0),
    };

    GenerationGc {
        collectors: names,
        count,
        delta_count,
        time_nanos,
        load,
    }
}

/// Sums collection counts and times, saturating at `u64::MAX`.
fn sum_counters<'a>(collectors: impl Iterator<Item = &'a CollectorCounters>) -> (u64, u64) {
    collectors.fold((0u64, 0u64), |(count, time), c| {
        (
            count.saturating_add(c.collection_count),
            time.saturating_add(c.collection_time_nanos),
        )
    })
}
