use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::SendMessageBatchRequestEntry;
use serde::Deserialize;
use tracing::warn;

use super::Publisher;

/// SQS's own API maximum for `SendMessageBatch`.
const SQS_BATCH_LIMIT: usize = 10;

fn default_sqs_batch() -> bool {
    false
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqsSinkConfig {
    pub sqs_queue_url: String,
    #[serde(default)]
    pub sqs_delay_seconds: i32,
    /// When false (the default), each already-serialized payload is sent immediately with
    /// `SendMessage`. When true, payloads are accumulated up to SQS's own ten-message batch
    /// limit and flushed with `SendMessageBatch`. This is independent of `records_per_message`,
    /// which controls how many records are folded into a single payload before it ever reaches
    /// this publisher; the two knobs compose.
    #[serde(default = "default_sqs_batch")]
    pub sqs_batch: bool,
}

pub struct SqsPublisher {
    client: Client,
    queue_url: String,
    delay_seconds: i32,
    batch: bool,
    buffer: Vec<Vec<u8>>,
    next_id: u64,
}

impl SqsPublisher {
    pub async fn new(config: SqsSinkConfig) -> Result<Self> {
        let shared_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self {
            client: Client::new(&shared_config),
            queue_url: config.sqs_queue_url,
            delay_seconds: config.sqs_delay_seconds,
            batch: config.sqs_batch,
            buffer: Vec::with_capacity(SQS_BATCH_LIMIT),
            next_id: 0,
        })
    }

    async fn send_one(&self, payload: Vec<u8>) -> Result<()> {
        let result = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(String::from_utf8_lossy(&payload).into_owned())
            .delay_seconds(self.delay_seconds)
            .send()
            .await;

        if let Err(e) = result {
            warn!(error = %e, "sqs send_message failed, dropping message");
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let entries: Vec<SendMessageBatchRequestEntry> = self
            .buffer
            .drain(..)
            .map(|payload| {
                self.next_id += 1;
                SendMessageBatchRequestEntry::builder()
                    .id(self.next_id.to_string())
                    .message_body(String::from_utf8_lossy(&payload).into_owned())
                    .delay_seconds(self.delay_seconds)
                    .build()
                    .expect("id and message_body are always set")
            })
            .collect();

        let response = self
            .client
            .send_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .context("SendMessageBatch to SQS")?;

        for failed in response.failed() {
            warn!(sqs_id = %failed.id(), error = %failed.message().unwrap_or(""), "sqs batch entry failed, dropping message");
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for SqsPublisher {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
        if !self.batch {
            return self.send_one(payload).await;
        }
        self.buffer.push(payload);
        if self.buffer.len() >= SQS_BATCH_LIMIT {
            self.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.flush().await
    }
}
