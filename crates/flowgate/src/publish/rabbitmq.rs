use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::Deserialize;

use super::Publisher;

fn default_rabbitmq_host() -> String {
    "localhost".to_string()
}

fn default_rabbitmq_port() -> u16 {
    5672
}

fn default_rabbitmq_username() -> String {
    "user".to_string()
}

fn default_rabbitmq_password() -> String {
    "bitnami".to_string()
}

fn default_rabbitmq_queue() -> String {
    "senzing-rabbitmq-queue".to_string()
}

fn default_rabbitmq_exchange() -> String {
    "senzing-rabbitmq-exchange".to_string()
}

fn default_rabbitmq_routing_key() -> String {
    "senzing.records".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RabbitMqSinkConfig {
    #[serde(default = "default_rabbitmq_host")]
    pub rabbitmq_host: String,
    #[serde(default = "default_rabbitmq_port")]
    pub rabbitmq_port: u16,
    #[serde(default = "default_rabbitmq_username")]
    pub rabbitmq_username: String,
    #[serde(default = "default_rabbitmq_password")]
    pub rabbitmq_password: String,
    #[serde(default = "default_rabbitmq_queue")]
    pub rabbitmq_queue: String,
    #[serde(default = "default_rabbitmq_exchange")]
    pub rabbitmq_exchange: String,
    #[serde(default = "default_rabbitmq_routing_key")]
    pub rabbitmq_routing_key: String,
    #[serde(default)]
    pub rabbitmq_use_existing_entities: bool,
}

const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// One connection and one channel per worker, per the "clients are never shared" rule.
pub struct RabbitMqPublisher {
    _connection: Connection,
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl RabbitMqPublisher {
    pub async fn connect(config: &RabbitMqSinkConfig) -> Result<Self> {
        let uri = format!(
            "amqp://{}:{}@{}:{}/%2f",
            config.rabbitmq_username, config.rabbitmq_password, config.rabbitmq_host, config.rabbitmq_port
        );
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .context("broker unreachable")?;
        let channel = connection.create_channel().await.context("opening RabbitMQ channel")?;

        let passive = config.rabbitmq_use_existing_entities;

        let exchange_result = channel
            .exchange_declare(
                &config.rabbitmq_exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions { passive, ..Default::default() },
                FieldTable::default(),
            )
            .await;
        classify_declare_error(exchange_result, "exchange")?;

        let queue_result = channel
            .queue_declare(
                &config.rabbitmq_queue,
                QueueDeclareOptions { passive, ..Default::default() },
                FieldTable::default(),
            )
            .await;
        classify_declare_error(queue_result.map(|_| ()), "queue")?;

        if !passive {
            channel
                .queue_bind(
                    &config.rabbitmq_queue,
                    &config.rabbitmq_exchange,
                    &config.rabbitmq_routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .context("binding queue to exchange")?;
        }

        Ok(Self {
            _connection: connection,
            channel,
            exchange: config.rabbitmq_exchange.clone(),
            routing_key: config.rabbitmq_routing_key.clone(),
        })
    }
}

fn classify_declare_error(result: lapin::Result<()>, entity: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(lapin::Error::ProtocolError(ref amqp_error)) if amqp_error.get_id() == 404 => {
            bail!("entities missing: {entity} does not exist and passive declare was requested")
        }
        Err(lapin::Error::ProtocolError(ref amqp_error)) if amqp_error.get_id() == 406 => {
            bail!("entities misconfigured: {entity} declaration conflicts with an existing entity")
        }
        Err(e) => Err(e).with_context(|| format!("declaring {entity}")),
    }
}

#[async_trait]
impl Publisher for RabbitMqPublisher {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
        // A single publish exception is recoverable: log and drop, keep the worker alive.
        let outcome = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE),
            )
            .await;
        if let Err(e) = outcome {
            tracing::warn!(exchange = %self.exchange, error = %e, "rabbitmq publish failed, dropping message");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.channel.close(200, "done").await.context("closing RabbitMQ channel")
    }
}
