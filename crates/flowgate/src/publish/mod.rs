//! Sink-side I/O. A `Publisher` knows nothing about batching or record shape; it just accepts
//! an already-serialized payload and ships it. Each sink worker owns its own publisher
//! instance — publishers are never shared across workers.

pub mod kafka;
pub mod rabbitmq;
pub mod sqs;
pub mod stdout;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SinkConfig;

#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Flush pending deliveries and close the underlying connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

pub enum PublisherBackend {
    Stdout(stdout::StdoutPublisher),
    Kafka(kafka::KafkaPublisher),
    RabbitMq(rabbitmq::RabbitMqPublisher),
    Sqs(sqs::SqsPublisher),
}

#[async_trait]
impl Publisher for PublisherBackend {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
        match self {
            PublisherBackend::Stdout(p) => p.publish(payload).await,
            PublisherBackend::Kafka(p) => p.publish(payload).await,
            PublisherBackend::RabbitMq(p) => p.publish(payload).await,
            PublisherBackend::Sqs(p) => p.publish(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            PublisherBackend::Stdout(p) => p.close().await,
            PublisherBackend::Kafka(p) => p.close().await,
            PublisherBackend::RabbitMq(p) => p.close().await,
            PublisherBackend::Sqs(p) => p.close().await,
        }
    }
}

/// Builds one fresh `PublisherBackend` per sink worker, per the "clients are never shared"
/// resource rule.
pub async fn from_config(config: &SinkConfig) -> Result<PublisherBackend> {
    Ok(match config {
        SinkConfig::Stdout => PublisherBackend::Stdout(stdout::StdoutPublisher::new()),
        SinkConfig::Kafka(c) => PublisherBackend::Kafka(kafka::KafkaPublisher::new(c)?),
        SinkConfig::RabbitMq(c) => PublisherBackend::RabbitMq(rabbitmq::RabbitMqPublisher::connect(c).await?),
        SinkConfig::Sqs(c) => PublisherBackend::Sqs(sqs::SqsPublisher::new(c.clone()).await?),
    })
}
