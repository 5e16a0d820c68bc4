//! Message-broker backend.
//!
//! One message per metric, produced asynchronously and flushed at the end
//! of every cycle. Whatever is still unacknowledged when the flush times out
//! counts as dropped. The count the producer reports covers everything it
//! still holds, including leftovers from earlier cycles, so every cycle logs
//! only the increase since the previous flush.
//!
//! The backend only talks to the broker through [`BrokerProducer`] and
//! [`TopicAdmin`]. The librdkafka binding lives behind the `kafka` feature.

#[cfg(feature = "kafka")]
pub mod librdkafka;

use crate::core::{Metric, ReporterError, Result};
use crate::export::convert;
use crate::export::filter::MetricFilter;
use crate::export::resource::{default_detector, ResourceDetector};
use crate::export::{ExportConfig, Exporter};
use crate::monitoring::ExportStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Flush timeout used when none is configured.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for a create-topic request.
pub const TOPIC_ADMIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Destination topic.
///
/// A partition or replica count of zero means the topic is expected to
/// exist already and no creation is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name.
    pub name: String,
    /// Partition count used when creating the topic.
    #[serde(default)]
    pub partitions: i32,
    /// Replication factor used when creating the topic.
    #[serde(default)]
    pub replicas: i32,
}

impl TopicConfig {
    /// Topic created with `partitions` and `replicas` if missing.
    pub fn new(name: impl Into<String>, partitions: i32, replicas: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replicas,
        }
    }

    /// Topic that is assumed to exist.
    pub fn existing(name: impl Into<String>) -> Self {
        Self::new(name, 0, 0)
    }

    /// Both counts are positive, so creation is attempted.
    pub fn should_create(&self) -> bool {
        self.partitions > 0 && self.replicas > 0
    }
}

/// Outcome of one produced message, as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The broker acknowledged the message.
    Delivered {
        /// Destination topic.
        topic: String,
        /// Partition the message landed in.
        partition: i32,
        /// Offset within that partition.
        offset: i64,
    },
    /// The message was rejected or timed out.
    Failed {
        /// Destination topic.
        topic: String,
        /// Client error.
        reason: String,
    },
}

/// Asynchronous producer handle.
///
/// Shared between the export path and the delivery drain task, so every
/// method takes `&self`.
pub trait BrokerProducer: Send + Sync + 'static {
    /// Queue one message with an unset key and automatic partitioning.
    fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Block until the queue is empty or `timeout` elapses. Returns the
    /// number of messages outstanding (queued or awaiting acknowledgement)
    /// when the flush returned.
    ///
    /// The count covers every message the producer still holds, including
    /// leftovers from earlier cycles, so it can fall as well as rise between
    /// flushes.
    fn flush(&self, timeout: Duration) -> i64;

    /// Hands out the delivery event stream. Returns `None` after the first
    /// call.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeliveryEvent>>;

    /// Close the handle. Calling it again is a no-op.
    fn close(&self);
}

/// Successful outcomes of a create-topic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCreation {
    /// The topic did not exist and was created.
    Created,
    /// The topic was already there.
    AlreadyExists,
}

/// Broker administration needed by the exporter.
#[async_trait::async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Create `topic`, giving up after `timeout`. An existing topic is
    /// [`TopicCreation::AlreadyExists`], not an error.
    async fn create_topic(&self, topic: &TopicConfig, timeout: Duration) -> Result<TopicCreation>;
}

/// Create `topic` unless it is configured as pre-existing. An existing
/// topic counts as success.
pub async fn ensure_topic(admin: &dyn TopicAdmin, topic: &TopicConfig) -> Result<()> {
    if !topic.should_create() {
        debug!(topic = %topic.name, "Topic creation disabled, assuming it exists");
        return Ok(());
    }

    match admin.create_topic(topic, TOPIC_ADMIN_TIMEOUT).await? {
        TopicCreation::Created => info!(
            topic = %topic.name,
            partitions = topic.partitions,
            replicas = topic.replicas,
            "Created topic"
        ),
        TopicCreation::AlreadyExists => debug!(topic = %topic.name, "Topic already exists"),
    }
    Ok(())
}

/// Turns successive outstanding counts into per-cycle deltas.
///
/// A negative delta means earlier leftovers were delivered in the meantime;
/// it is reported as is and never counted as dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DroppedTracker {
    last: i64,
}

impl DroppedTracker {
    /// Tracker whose previous count is `last`.
    pub fn new(last: i64) -> Self {
        Self { last }
    }

    /// Record a new outstanding count and return the change since the
    /// previous observation.
    pub fn observe(&mut self, outstanding: i64) -> i64 {
        let delta = outstanding - self.last;
        self.last = outstanding;
        delta
    }

    /// Count seen at the last observation.
    pub fn last(&self) -> i64 {
        self.last
    }
}

/// Broker exporter over any [`BrokerProducer`].
pub struct KafkaExporter<P: BrokerProducer> {
    topic: TopicConfig,
    producer: Arc<P>,
    filter: MetricFilter,
    detector: Box<dyn ResourceDetector>,
    flush_timeout: Duration,
    dropped: DroppedTracker,
    stats: Arc<ExportStats>,
    drain: Option<JoinHandle<()>>,
    closed: bool,
}

impl<P: BrokerProducer> KafkaExporter<P> {
    /// Ensure the topic exists, then wrap `producer`.
    pub async fn new(
        config: &ExportConfig,
        topic: TopicConfig,
        producer: P,
        admin: &dyn TopicAdmin,
    ) -> Result<Self> {
        let filter = MetricFilter::new(&config.include_filter)?;
        ensure_topic(admin, &topic).await?;
        Ok(Self::assemble(filter, topic, producer))
    }

    /// Wrap `producer` without touching topic administration.
    pub fn with_producer(config: &ExportConfig, topic: TopicConfig, producer: P) -> Result<Self> {
        let filter = MetricFilter::new(&config.include_filter)?;
        Ok(Self::assemble(filter, topic, producer))
    }

    fn assemble(filter: MetricFilter, topic: TopicConfig, producer: P) -> Self {
        Self {
            topic,
            producer: Arc::new(producer),
            filter,
            detector: default_detector(),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            dropped: DroppedTracker::default(),
            stats: Arc::new(ExportStats::new()),
            drain: None,
            closed: false,
        }
    }

    /// Replace the resource detector.
    pub fn with_detector(mut self, detector: Box<dyn ResourceDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Bound the end-of-cycle flush by `timeout`.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Change the flush bound for later cycles.
    pub fn set_flush_timeout(&mut self, timeout: Duration) {
        self.flush_timeout = timeout;
    }

    /// Current flush bound.
    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Destination topic.
    pub fn topic(&self) -> &TopicConfig {
        &self.topic
    }

    /// Outstanding count reported by the last flush.
    pub fn last_dropped(&self) -> i64 {
        self.dropped.last()
    }

    /// The underlying producer.
    pub fn producer(&self) -> &P {
        &self.producer
    }

    fn ensure_drain(&mut self) {
        if self.drain.is_some() {
            return;
        }
        if let Some(events) = self.producer.take_events() {
            self.drain = Some(tokio::spawn(drain_events(events, Arc::clone(&self.stats))));
        }
    }
}

async fn drain_events(mut events: mpsc::UnboundedReceiver<DeliveryEvent>, stats: Arc<ExportStats>) {
    while let Some(event) = events.recv().await {
        match event {
            DeliveryEvent::Delivered {
                topic,
                partition,
                offset,
            } => {
                trace!(%topic, partition, offset, "Metric delivered");
                stats.record_delivery(true);
            },
            DeliveryEvent::Failed { topic, reason } => {
                warn!(%topic, %reason, "Metric delivery failed");
                stats.record_delivery(false);
            },
        }
    }
    debug!("Delivery event stream closed");
}

#[async_trait::async_trait]
impl<P: BrokerProducer> Exporter for KafkaExporter<P> {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn export_metrics(&mut self, metrics: &[Metric]) -> Result<()> {
        if self.closed {
            return Err(ReporterError::broker("producer is closed"));
        }
        self.ensure_drain();

        let resource = self.detector.detect()?;
        let mut produced = 0usize;
        for metric in self.filter.select(metrics) {
            let payload = convert::encode_metric(&metric.with_resource(resource.clone()))?;
            self.producer.produce(&self.topic.name, payload)?;
            produced += 1;
        }

        let producer = Arc::clone(&self.producer);
        let timeout = self.flush_timeout;
        let dropped = tokio::task::spawn_blocking(move || producer.flush(timeout)).await?;

        let delta = self.dropped.observe(dropped);
        self.stats.record_dropped(dropped, delta);
        if delta > 0 {
            warn!(
                topic = %self.topic.name,
                dropped = delta,
                outstanding = dropped,
                "Messages still unacknowledged after flush timeout"
            );
        }

        debug!(topic = %self.topic.name, produced, "Export cycle flushed");
        Ok(())
    }

    async fn stop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.producer.close();

        if let Some(handle) = self.drain.take() {
            if tokio::time::timeout(Duration::from_secs(1), handle).await.is_err() {
                debug!("Delivery drain task still running after producer close");
            }
        }
        info!(topic = %self.topic.name, "Kafka exporter stopped");
    }

    fn stats(&self) -> Option<Arc<ExportStats>> {
        Some(Arc::clone(&self.stats))
    }
}
