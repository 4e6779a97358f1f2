//! Pulls envelopes off the hand-off queue, runs the governor, evaluates and serializes
//! records, and publishes. Buffers up to `records_per_message` records before flushing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::governor::Governor;
use crate::metrics::Metrics;
use crate::publish::Publisher;
use crate::record::{Envelope, Record};
use crate::serialize;

/// How long a sink worker waits to re-enqueue `EndOfStream` for its siblings before giving up
/// and exiting. Without this, the last worker standing could block forever trying to put the
/// sentinel back on a full queue nobody is left to drain.
const END_OF_STREAM_REENQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct SinkDefaults {
    pub data_source: Option<String>,
    pub entity_type: Option<String>,
}

pub struct SinkWorkerConfig {
    pub records_per_message: usize,
    pub record_size_max: usize,
    pub record_identifier: String,
    pub record_monitor: u64,
    pub defaults: SinkDefaults,
}

pub struct SinkWorker<P: Publisher> {
    worker_id: usize,
    rx: Receiver<Envelope>,
    tx: Sender<Envelope>,
    publisher: P,
    governor: Arc<dyn Governor>,
    metrics: Arc<Metrics>,
    config: SinkWorkerConfig,
}

impl<P: Publisher> SinkWorker<P> {
    pub fn new(
        worker_id: usize,
        rx: Receiver<Envelope>,
        tx: Sender<Envelope>,
        publisher: P,
        governor: Arc<dyn Governor>,
        metrics: Arc<Metrics>,
        config: SinkWorkerConfig,
    ) -> Self {
        Self { worker_id, rx, tx, publisher, governor, metrics, config }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut buffer: Vec<Record> = Vec::with_capacity(self.config.records_per_message.max(1));
        let mut published_since_log: u64 = 0;

        loop {
            match self.rx.recv().await {
                Ok(Envelope::EndOfStream) => {
                    match tokio::time::timeout(END_OF_STREAM_REENQUEUE_TIMEOUT, self.tx.send(Envelope::EndOfStream)).await {
                        Ok(Ok(())) => {}
                        _ => debug!(worker_id = self.worker_id, "no sibling left to observe EndOfStream re-enqueue"),
                    }
                    self.flush(&mut buffer, &mut published_since_log).await?;
                    break;
                }
                Ok(Envelope::Record(mut record)) => {
                    self.governor.govern().await.context("governor denied publish")?;

                    record.inject_defaults(
                        self.config.defaults.data_source.as_deref(),
                        self.config.defaults.entity_type.as_deref(),
                    );

                    let serialized_len = serialize::serialize_one(&record)?.len();
                    if self.config.record_size_max > 0 && serialized_len > self.config.record_size_max {
                        warn!(
                            worker_id = self.worker_id,
                            record_id = %record.identifier(&self.config.record_identifier),
                            size = serialized_len,
                            limit = self.config.record_size_max,
                            "dropping oversize record"
                        );
                        self.metrics.record_dropped_oversize();
                        continue;
                    }

                    buffer.push(record);
                    if buffer.len() >= self.config.records_per_message {
                        self.flush(&mut buffer, &mut published_since_log).await?;
                    }
                }
                Err(_) => break,
            }
        }

        self.publisher.close().await.context("closing sink publisher")?;
        self.governor.close().await.context("closing governor")?;
        self.metrics.worker_exited();
        Ok(())
    }

    async fn flush(&mut self, buffer: &mut Vec<Record>, published_since_log: &mut u64) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let payload = if buffer.len() == 1 && self.config.records_per_message <= 1 {
            serialize::serialize_one(&buffer[0])?
        } else {
            serialize::serialize_batch(buffer)?
        };

        self.publisher.publish(payload).await.context("publishing message")?;

        let count = buffer.len() as u64;
        self.metrics.record_output(count);
        *published_since_log += count;
        buffer.clear();

        if self.config.record_monitor > 0 && *published_since_log >= self.config.record_monitor {
            info!(worker_id = self.worker_id, total_published = self.metrics.snapshot().output_counter, "progress");
            *published_since_log = 0;
        }
        Ok(())
    }
}
