//! Broker backend tests against an in-memory producer and topic admin.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use telemetry_reporter::core::{Resource, ReporterError, Result};
use telemetry_reporter::export::convert::decode_metric;
use telemetry_reporter::export::kafka::{
    ensure_topic, BrokerProducer, DeliveryEvent, DroppedTracker, KafkaExporter, TopicAdmin,
    TopicConfig, TopicCreation,
};
use telemetry_reporter::export::resource::StaticDetector;
use telemetry_reporter::export::{ExportConfig, Exporter};
use tokio::sync::mpsc;

mod common;
use common::*;

/// Admin that remembers which topics exist.
#[derive(Default)]
struct FakeAdmin {
    topics: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl FakeAdmin {
    fn with_topic(name: &str) -> Self {
        let admin = Self::default();
        admin.topics.lock().insert(name.to_string());
        admin
    }
}

#[async_trait::async_trait]
impl TopicAdmin for FakeAdmin {
    async fn create_topic(&self, topic: &TopicConfig, _: Duration) -> Result<TopicCreation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.topics.lock().insert(topic.name.clone()) {
            Ok(TopicCreation::Created)
        } else {
            Ok(TopicCreation::AlreadyExists)
        }
    }
}

/// Producer that acknowledges everything immediately and reports scripted
/// outstanding counts on flush.
struct FakeProducer {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    flush_results: Mutex<VecDeque<i64>>,
    flushes: AtomicUsize,
    fail_on_message: Option<usize>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<DeliveryEvent>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DeliveryEvent>>>,
    closes: AtomicUsize,
}

impl FakeProducer {
    fn new(flush_results: &[i64]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            messages: Mutex::new(Vec::new()),
            flush_results: Mutex::new(flush_results.iter().copied().collect()),
            flushes: AtomicUsize::new(0),
            fail_on_message: None,
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            closes: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, message_index: usize) -> Self {
        self.fail_on_message = Some(message_index);
        self
    }

    fn message_count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl BrokerProducer for FakeProducer {
    fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut messages = self.messages.lock();
        if self.fail_on_message == Some(messages.len()) {
            return Err(ReporterError::Produce {
                topic: topic.to_string(),
                reason: "queue full".to_string(),
            });
        }
        messages.push((topic.to_string(), payload));

        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(DeliveryEvent::Delivered {
                topic: topic.to_string(),
                partition: 0,
                offset: messages.len() as i64 - 1,
            });
        }
        Ok(())
    }

    fn flush(&self, _: Duration) -> i64 {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let mut results = self.flush_results.lock();
        if results.len() > 1 {
            results.pop_front().unwrap_or_default()
        } else {
            results.front().copied().unwrap_or_default()
        }
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeliveryEvent>> {
        self.events_rx.lock().take()
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.events_tx.lock().take();
    }
}

fn export_config(filter: &str) -> ExportConfig {
    ExportConfig::new(filter, Duration::from_secs(60))
}

fn exporter(filter: &str, producer: FakeProducer) -> KafkaExporter<FakeProducer> {
    KafkaExporter::with_producer(&export_config(filter), TopicConfig::existing("metrics"), producer)
        .unwrap()
        .with_detector(Box::new(StaticDetector(None)))
}

async fn wait_for_deliveries(exporter: &KafkaExporter<FakeProducer>, expected: u64) {
    let stats = exporter.stats().unwrap();
    for _ in 0..100 {
        if stats.snapshot().delivered >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("only {} of {} deliveries recorded", stats.snapshot().delivered, expected);
}

/// Creating an existing topic twice succeeds both times
#[tokio::test]
async fn test_topic_creation_is_idempotent() {
    let admin = FakeAdmin::with_topic("metrics");
    let topic = TopicConfig::new("metrics", 3, 1);

    ensure_topic(&admin, &topic).await.unwrap();
    ensure_topic(&admin, &topic).await.unwrap();
    assert_eq!(admin.calls.load(Ordering::SeqCst), 2);

    let first = KafkaExporter::new(&export_config(".*"), topic.clone(), FakeProducer::new(&[0]), &admin).await;
    let second = KafkaExporter::new(&export_config(".*"), topic, FakeProducer::new(&[0]), &admin).await;
    assert!(first.is_ok());
    assert!(second.is_ok());
}

/// A fresh topic is created once and then reported as existing
#[tokio::test]
async fn test_topic_created_then_exists() {
    let admin = FakeAdmin::default();
    let topic = TopicConfig::new("fresh", 1, 1);
    assert_eq!(admin.create_topic(&topic, Duration::from_secs(1)).await.unwrap(), TopicCreation::Created);
    assert_eq!(
        admin.create_topic(&topic, Duration::from_secs(1)).await.unwrap(),
        TopicCreation::AlreadyExists
    );
}

/// Each cycle accounts only for growth in the outstanding count
#[tokio::test]
async fn test_dropped_count_delta() {
    let mut tracker = DroppedTracker::new(5);
    assert_eq!(tracker.observe(8), 3);
    assert_eq!(tracker.last(), 8);

    let mut exporter = exporter(".*", FakeProducer::new(&[5, 8, 8, 2]));
    let metrics = vec![reference_metric()];

    exporter.export_metrics(&metrics).await.unwrap();
    assert_eq!(exporter.last_dropped(), 5);

    exporter.export_metrics(&metrics).await.unwrap();
    assert_eq!(exporter.last_dropped(), 8);

    exporter.export_metrics(&metrics).await.unwrap();
    let stats = exporter.stats().unwrap().snapshot();
    assert_eq!(stats.last_dropped, 8);
    assert_eq!(stats.dropped_total, 8);

    exporter.export_metrics(&metrics).await.unwrap();
    let stats = exporter.stats().unwrap().snapshot();
    assert_eq!(stats.last_dropped, 2);
    assert_eq!(stats.dropped_total, 8);
    assert_eq!(exporter.producer().flushes.load(Ordering::SeqCst), 4);
}

/// One message per matching metric, each a standalone wire metric
#[tokio::test]
async fn test_one_message_per_metric() {
    let mut exporter = exporter("^metric", FakeProducer::new(&[0]))
        .with_detector(Box::new(StaticDetector(Some(Resource::new("k8s").with_label("pod", "p-1")))));

    let metrics = vec![
        TestMetricBuilder::new("metric1").build(),
        TestMetricBuilder::new("other").build(),
        TestMetricBuilder::new("metric2").build(),
    ];
    exporter.export_metrics(&metrics).await.unwrap();

    let messages = exporter.producer().messages.lock().clone();
    assert_eq!(messages.len(), 2);

    let decoded: Vec<_> = messages
        .iter()
        .map(|(topic, payload)| {
            assert_eq!(topic, "metrics");
            decode_metric(payload).unwrap()
        })
        .collect();
    assert_eq!(decoded[0].name(), "metric1");
    assert_eq!(decoded[1].name(), "metric2");
    assert_eq!(decoded[1].resource.as_ref().unwrap().labels["pod"], "p-1");

    let expected = metrics[0].with_resource(Some(Resource::new("k8s").with_label("pod", "p-1")));
    assert_eq!(decoded[0], expected);

    wait_for_deliveries(&exporter, 2).await;
}

/// Include filter "^metric1$" keeps metric1 and drops metric2
#[tokio::test]
async fn test_exact_include_filter() {
    let mut exporter = exporter("^metric1$", FakeProducer::new(&[0]));
    exporter
        .export_metrics(&[
            TestMetricBuilder::new("metric1").build(),
            TestMetricBuilder::new("metric2").build(),
        ])
        .await
        .unwrap();

    let messages = exporter.producer().messages.lock().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(decode_metric(&messages[0].1).unwrap().name(), "metric1");
}

/// A produce error aborts the cycle before the flush
#[tokio::test]
async fn test_produce_error_aborts_cycle() {
    let mut exporter = exporter(".*", FakeProducer::new(&[0]).failing_on(1));
    let metrics = vec![
        TestMetricBuilder::new("a").build(),
        TestMetricBuilder::new("b").build(),
        TestMetricBuilder::new("c").build(),
    ];

    let err = exporter.export_metrics(&metrics).await.unwrap_err();
    assert!(matches!(err, ReporterError::Produce { .. }));
    assert!(err.is_recoverable());
    assert_eq!(exporter.producer().message_count(), 1);
    assert_eq!(exporter.producer().flushes.load(Ordering::SeqCst), 0);
}

/// Stop closes the producer once and ends the delivery drain
#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut exporter = exporter(".*", FakeProducer::new(&[0]));
    exporter.export_metrics(&[reference_metric()]).await.unwrap();
    wait_for_deliveries(&exporter, 1).await;

    exporter.stop().await;
    exporter.stop().await;
    assert_eq!(exporter.producer().closes.load(Ordering::SeqCst), 1);

    let err = exporter.export_metrics(&[reference_metric()]).await.unwrap_err();
    assert_eq!(err.category(), "broker");
}

/// Failed deliveries are counted, not raised
#[tokio::test]
async fn test_failed_delivery_is_counted() {
    let producer = FakeProducer::new(&[0]);
    let tx = producer.events_tx.lock().clone().unwrap();
    let mut exporter = exporter(".*", producer);

    exporter.export_metrics(&[]).await.unwrap();
    tx.send(DeliveryEvent::Failed {
        topic: "metrics".to_string(),
        reason: "message timed out".to_string(),
    })
    .unwrap();

    let stats = exporter.stats().unwrap();
    for _ in 0..100 {
        if stats.snapshot().delivery_failed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stats.snapshot().delivery_failed, 1);
    assert_eq!(stats.snapshot().delivered, 0);
}
