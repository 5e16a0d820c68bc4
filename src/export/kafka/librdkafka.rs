//! librdkafka implementations of [`BrokerProducer`] and [`TopicAdmin`].

use super::{
    BrokerProducer, DeliveryEvent, KafkaExporter, TopicAdmin, TopicConfig, TopicCreation,
};
use crate::core::{ReporterError, Result};
use crate::export::ExportConfig;
use parking_lot::{Mutex, RwLock};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::{ClientContext, DefaultClientContext};
use rdkafka::config::ClientConfig;
use rdkafka::message::Message;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

fn client_config(brokers: &BTreeMap<String, String>) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in brokers {
        config.set(key, value);
    }
    config
}

/// Forwards delivery reports from the librdkafka poll thread.
pub struct DeliveryContext {
    events: mpsc::UnboundedSender<DeliveryEvent>,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        let event = match result {
            Ok(message) => DeliveryEvent::Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
            Err((err, message)) => DeliveryEvent::Failed {
                topic: message.topic().to_string(),
                reason: err.to_string(),
            },
        };
        // The receiver is gone once the exporter stopped draining.
        let _ = self.events.send(event);
    }
}

/// librdkafka producer forwarding delivery reports to the drain task.
pub struct RdKafkaProducer {
    inner: RwLock<Option<ThreadedProducer<DeliveryContext>>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<DeliveryEvent>>>,
}

impl RdKafkaProducer {
    /// Producer configured from librdkafka `brokers` properties.
    pub fn new(brokers: &BTreeMap<String, String>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<DeliveryContext> = client_config(brokers)
            .create_with_context(DeliveryContext { events: tx })
            .map_err(|e| ReporterError::broker(format!("failed to create producer: {e}")))?;

        Ok(Self {
            inner: RwLock::new(Some(producer)),
            events: Mutex::new(Some(rx)),
        })
    }
}

impl BrokerProducer for RdKafkaProducer {
    fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let guard = self.inner.read();
        let producer = guard
            .as_ref()
            .ok_or_else(|| ReporterError::broker("producer is closed"))?;

        producer
            .send(BaseRecord::<(), [u8]>::to(topic).payload(payload.as_slice()))
            .map_err(|(err, _)| ReporterError::Produce {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn flush(&self, timeout: Duration) -> i64 {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some(producer) => {
                // Whatever is still queued or awaiting acknowledgement after the
                // timeout is reported as outstanding.
                let _ = producer.flush(Timeout::After(timeout));
                i64::from(producer.in_flight_count())
            },
            None => 0,
        }
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeliveryEvent>> {
        self.events.lock().take()
    }

    fn close(&self) {
        // Dropping the producer joins its poll thread and drops the event sender.
        drop(self.inner.write().take());
    }
}

/// librdkafka admin client used to create the destination topic.
pub struct RdKafkaAdmin {
    client: AdminClient<DefaultClientContext>,
}

impl RdKafkaAdmin {
    /// Admin client configured from librdkafka `brokers` properties.
    pub fn new(brokers: &BTreeMap<String, String>) -> Result<Self> {
        let client = client_config(brokers)
            .create()
            .map_err(|e| ReporterError::broker(format!("failed to create admin client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl TopicAdmin for RdKafkaAdmin {
    async fn create_topic(&self, topic: &TopicConfig, timeout: Duration) -> Result<TopicCreation> {
        let new_topic = NewTopic::new(
            &topic.name,
            topic.partitions,
            TopicReplication::Fixed(topic.replicas),
        );
        let options = AdminOptions::new().operation_timeout(Some(Timeout::After(timeout)));

        let results = self
            .client
            .create_topics(&[new_topic], &options)
            .await
            .map_err(|e| ReporterError::TopicCreation {
                topic: topic.name.clone(),
                reason: e.to_string(),
            })?;

        match results.into_iter().next() {
            Some(Ok(_)) => Ok(TopicCreation::Created),
            Some(Err((_, RDKafkaErrorCode::TopicAlreadyExists))) => Ok(TopicCreation::AlreadyExists),
            Some(Err((name, code))) => Err(ReporterError::TopicCreation {
                topic: name,
                reason: code.to_string(),
            }),
            None => Err(ReporterError::TopicCreation {
                topic: topic.name.clone(),
                reason: "empty admin response".to_string(),
            }),
        }
    }
}

impl KafkaExporter<RdKafkaProducer> {
    /// Create the topic if configured, then open a producer.
    pub async fn connect(
        config: &ExportConfig,
        brokers: &BTreeMap<String, String>,
        topic: TopicConfig,
    ) -> Result<Self> {
        crate::export::MetricFilter::new(&config.include_filter)?;
        let admin = RdKafkaAdmin::new(brokers)?;
        super::ensure_topic(&admin, &topic).await?;
        let producer = RdKafkaProducer::new(brokers)?;
        Self::with_producer(config, topic, producer)
    }
}
