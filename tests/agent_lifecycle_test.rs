//! Exporter agent lifecycle and scheduling tests.

use std::sync::Arc;
use std::time::Duration;
use telemetry_reporter::export::{ExportConfig, ExporterAgent};

mod common;
use common::*;

fn agent_with_counts(period: Duration, delay: Duration) -> (Arc<ExporterAgent>, Arc<ExportCounts>) {
    let (exporter, counts) = CountingExporter::new(delay);
    let agent = ExporterAgent::new(
        Box::new(exporter),
        ExportConfig::new(".*", period),
        FixedReader::new(vec![reference_metric()]),
    );
    (Arc::new(agent), counts)
}

/// Concurrent starts build the periodic driver exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_builds_one_driver() {
    let (agent, _counts) = agent_with_counts(Duration::from_secs(3600), Duration::ZERO);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.start() })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(agent.driver_builds(), 1);
    assert!(agent.is_running());
    agent.stop().await;
}

/// Stopping twice stops the backend once and never panics
#[tokio::test]
async fn test_double_stop() {
    let (agent, counts) = agent_with_counts(Duration::from_secs(3600), Duration::ZERO);
    agent.start().unwrap();

    agent.stop().await;
    agent.stop().await;

    assert_eq!(counts.stops(), 1);
    assert!(!agent.is_running());
}

/// Stop without start still releases the backend
#[tokio::test]
async fn test_stop_before_start() {
    let (agent, counts) = agent_with_counts(Duration::from_secs(3600), Duration::ZERO);
    agent.stop().await;
    assert_eq!(counts.stops(), 1);
    assert_eq!(agent.driver_builds(), 0);
}

/// The first export waits one period, then runs on every tick
#[tokio::test(start_paused = true)]
async fn test_periodic_exports() {
    let (agent, counts) = agent_with_counts(Duration::from_secs(10), Duration::ZERO);
    agent.start().unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(counts.exports(), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(counts.exports(), 3);
    assert_eq!(*counts.last_batch.lock(), vec!["metric".to_string()]);

    agent.stop().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(counts.exports(), 3);
}

/// A cycle slower than the period never overlaps the next one
#[tokio::test(start_paused = true)]
async fn test_slow_cycles_never_overlap() {
    let (agent, counts) = agent_with_counts(Duration::from_secs(1), Duration::from_millis(2500));
    agent.start().unwrap();

    // Manual cycles race the periodic ones for the backend.
    let manual = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move {
            for _ in 0..3 {
                agent.export_once().await.unwrap();
            }
        })
    };

    tokio::time::sleep(Duration::from_secs(20)).await;
    manual.await.unwrap();

    assert!(counts.exports() >= 3);
    assert_eq!(counts.max_in_flight(), 1);
    agent.stop().await;
}

/// A stopped agent cannot be restarted
#[tokio::test]
async fn test_restart_after_stop_fails() {
    let (agent, _counts) = agent_with_counts(Duration::from_secs(1), Duration::ZERO);
    agent.start().unwrap();
    agent.stop().await;
    assert!(agent.start().is_err());
}

/// Racing start against stop never leaves a loop running on a stopped backend
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_racing_stop_leaves_no_loop() {
    for _ in 0..50 {
        let (agent, counts) = agent_with_counts(Duration::from_millis(5), Duration::ZERO);

        let starter = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                let _ = agent.start();
            })
        };
        let stopper = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.stop().await })
        };
        starter.await.unwrap();
        stopper.await.unwrap();

        assert!(!agent.is_running());
        assert_eq!(counts.stops(), 1);

        let exports = counts.exports();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counts.exports(), exports);
    }
}
