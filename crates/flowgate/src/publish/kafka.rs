use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::ClientContext;
use rdkafka::Message;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use serde::Deserialize;
use tracing::warn;

use super::Publisher;

fn default_kafka_bootstrap_server() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_topic() -> String {
    "senzing-kafka-topic".to_string()
}

fn default_kafka_group() -> String {
    "senzing-kafka-group".to_string()
}

fn default_kafka_poll_interval() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaSinkConfig {
    #[serde(default = "default_kafka_bootstrap_server")]
    pub kafka_bootstrap_server: String,
    #[serde(default = "default_kafka_topic")]
    pub kafka_topic: String,
    #[serde(default = "default_kafka_group")]
    pub kafka_group: String,
    #[serde(default = "default_kafka_poll_interval")]
    pub kafka_poll_interval: u64,
}

struct DeliveryLogger;

impl ClientContext for DeliveryLogger {}

impl ProducerContext for DeliveryLogger {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        if let Err((err, borrowed)) = result {
            warn!(
                topic = borrowed.topic(),
                payload_len = borrowed.payload().map(<[u8]>::len).unwrap_or(0),
                error = %err,
                "kafka delivery failed"
            );
        }
    }
}

/// One `BaseProducer` per worker. Delivery failures are logged and the message is dropped;
/// they never propagate as an error from `publish`, matching the recoverable-publish-error
/// policy.
pub struct KafkaPublisher {
    producer: BaseProducer<DeliveryLogger>,
    topic: String,
    poll_interval: u64,
    produced_since_poll: u64,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaSinkConfig) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_bootstrap_server)
            .set("group.id", &config.kafka_group)
            .create_with_context(DeliveryLogger)
            .context("creating Kafka producer")?;

        Ok(Self {
            producer,
            topic: config.kafka_topic.clone(),
            poll_interval: config.kafka_poll_interval.max(1),
            produced_since_poll: 0,
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
        let record: BaseRecord<'_, (), [u8]> = BaseRecord::to(&self.topic).payload(&payload[..]);
        if let Err((err, _record)) = self.producer.send(record) {
            warn!(topic = %self.topic, error = %err, "kafka produce failed, dropping message");
        }

        self.produced_since_poll += 1;
        if self.produced_since_poll >= self.poll_interval {
            self.producer.poll(Duration::from_millis(0));
            self.produced_since_poll = 0;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(30))
            .context("flushing Kafka producer on close")
    }
}
