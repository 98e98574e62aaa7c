mod helpers;

use helpers::counters::counters;
use helpers::mock_transport::{RecordingTransport, RejectingTransport};
use helpers::test_metrics::TestMetrics;
use jvmwatch::monitor::{Monitor, MonitorExit};
use jvmwatch::sampler::Sampler;
use jvmwatch::source::test_utils::FakeCounterSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const INTERVAL: Duration = Duration::from_secs(10);

/// A source with a baseline read followed by `samples` good reads, then a broken connection.
fn source_with_reads(samples: u64) -> FakeCounterSource {
    let source = FakeCounterSource::new();
    for i in 0..=samples {
        source.push_counters(counters(i * 1_000_000_000, i * 400_000_000));
    }
    source.push_read_error("connection reset");
    source
}

async fn attached(source: &FakeCounterSource) -> Sampler {
    let mut sampler = Sampler::new(Box::new(source.clone()));
    sampler.attach().await.unwrap();
    sampler
}

#[tokio::test(start_paused = true)]
async fn test_every_tick_is_dispatched_until_connection_is_lost() {
    let source = source_with_reads(3);
    let transport = RecordingTransport::new();
    let test_metrics = TestMetrics::new();
    let monitor = Monitor::new(
        attached(&source).await,
        Arc::new(transport.clone()),
        INTERVAL,
        Arc::new(test_metrics.metrics()),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let exit = monitor.run(shutdown_rx).await;

    assert_eq!(exit, MonitorExit::ConnectionLost);
    let snapshots = transport.snapshots();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| (s.cpu_load - 0.4).abs() < 1e-12));
    assert_eq!(test_metrics.get_counter("snapshots_sampled_total"), 3);
    assert_eq!(test_metrics.get_counter("snapshots_dropped_total"), 0);
    assert_eq!(test_metrics.get_gauge("sampler_attached"), Some(0.0));
    assert!(!source.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_snapshots_are_dropped_and_sampling_continues() {
    let source = source_with_reads(4);
    let transport = RejectingTransport::new();
    let test_metrics = TestMetrics::new();
    let monitor = Monitor::new(
        attached(&source).await,
        Arc::new(transport.clone()),
        INTERVAL,
        Arc::new(test_metrics.metrics()),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let exit = monitor.run(shutdown_rx).await;

    // Backpressure never ends the loop; only the lost connection does.
    assert_eq!(exit, MonitorExit::ConnectionLost);
    // One offer per tick, no retries.
    assert_eq!(transport.attempts(), 4);
    assert_eq!(test_metrics.get_counter("snapshots_dropped_total"), 4);
    assert_eq!(test_metrics.get_counter("snapshots_sampled_total"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_shutdown_sender_does_not_stop_sampling() {
    let source = source_with_reads(2);
    let transport = RecordingTransport::new();
    let monitor = Monitor::new(
        attached(&source).await,
        Arc::new(transport.clone()),
        INTERVAL,
        Arc::new(TestMetrics::new().metrics()),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    let exit = monitor.run(shutdown_rx).await;

    assert_eq!(exit, MonitorExit::ConnectionLost);
    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_sampling_and_detaches() {
    let source = FakeCounterSource::steady();
    let transport = RecordingTransport::new();
    let monitor = Monitor::new(
        attached(&source).await,
        Arc::new(transport.clone()),
        INTERVAL,
        Arc::new(TestMetrics::new().metrics()),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(shutdown_rx));

    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(5)).await;
    shutdown_tx.send(true).unwrap();
    let exit = handle.await.unwrap();

    assert_eq!(exit, MonitorExit::Shutdown);
    assert_eq!(transport.count(), 3);
    assert!(!source.is_connected());
    assert_eq!(source.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_sample_waits_one_interval() {
    let source = FakeCounterSource::steady();
    let transport = RecordingTransport::new();
    let monitor = Monitor::new(
        attached(&source).await,
        Arc::new(transport.clone()),
        INTERVAL,
        Arc::new(TestMetrics::new().metrics()),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(shutdown_rx));

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(transport.count(), 0);
    assert_eq!(source.read_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.count(), 1);

    shutdown_tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), MonitorExit::Shutdown);
}
