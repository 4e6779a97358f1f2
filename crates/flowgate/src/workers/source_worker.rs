//! Pulls decoded records off the configured `Source`, applies the record window, and feeds the
//! hand-off queue. Enqueues `EndOfStream` exactly once, then returns.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tracing::{debug, error, info};

use crate::metrics::Metrics;
use crate::record::{Envelope, RecordWindow, WindowDecision};
use crate::source::Source;

pub struct SourceWorker {
    source: Box<dyn Source>,
    tx: Sender<Envelope>,
    window: RecordWindow,
    metrics: Arc<Metrics>,
}

impl SourceWorker {
    pub fn new(source: Box<dyn Source>, tx: Sender<Envelope>, window: RecordWindow, metrics: Arc<Metrics>) -> Self {
        Self { source, tx, window, metrics }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut ordinal: u64 = 0;

        loop {
            let record = match self.source.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    error!(error = ?e, "source decode failed, aborting pipeline");
                    let _ = self.tx.send(Envelope::EndOfStream).await;
                    return Err(e).context("fatal source error");
                }
            };

            ordinal += 1;
            match self.window.decision(ordinal) {
                WindowDecision::Skip => continue,
                WindowDecision::Stop => break,
                WindowDecision::Emit => {
                    self.metrics.record_input();
                    if self.tx.send(Envelope::Record(record)).await.is_err() {
                        debug!("hand-off queue closed, no consumers remain");
                        break;
                    }
                }
                WindowDecision::EmitAndStop => {
                    self.metrics.record_input();
                    let _ = self.tx.send(Envelope::Record(record)).await;
                    break;
                }
            }
        }

        self.source.close().await.context("closing source")?;
        // Enqueued exactly once; every sink worker that observes it re-enqueues it for its
        // siblings before exiting.
        let _ = self.tx.send(Envelope::EndOfStream).await;
        info!(records_read = ordinal, "source exhausted");
        Ok(())
    }
}
