//! Orchestrates the three stages: builds the hand-off queue, spawns the source worker, the
//! sink worker pool, and the monitor, and drives the pipeline through its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AppConfig;
use crate::governor::{Governor, NoopGovernor};
use crate::metrics::Metrics;
use crate::monitor::Monitor;
use crate::publish;
use crate::publish::Publisher;
use crate::record::{Envelope, RecordWindow};
use crate::source;
use crate::workers::sink_worker::{SinkDefaults, SinkWorker, SinkWorkerConfig};
use crate::workers::source_worker::SourceWorker;

/// Mirrors the `INIT -> RUNNING -> DRAINING -> STOPPED` lifecycle. Tracked for observability
/// only; nothing currently branches on it besides the start-up handicap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Running,
    Draining,
    Stopped,
}

/// The fixed pause between spawning the source and spawning the sink workers, giving the
/// source a head start to prime the queue.
const SOURCE_HANDICAP: Duration = Duration::from_secs(5);

pub async fn run(config: AppConfig) -> Result<()> {
    if config.runtime.delay_in_seconds > 0 {
        tokio::time::sleep(Duration::from_secs(config.runtime.delay_in_seconds)).await;
    }

    let mut state = PipelineState::Init;
    info!(?state, "pipeline starting");

    let window = RecordWindow { min: config.runtime.record_min, max: config.runtime.record_max };
    let worker_count = config.runtime.threads_per_print.max(1);
    let metrics = Arc::new(Metrics::new(worker_count));
    let governor: Arc<dyn Governor> = Arc::new(NoopGovernor);

    let (tx, rx) = async_channel::bounded::<Envelope>(config.runtime.read_queue_maxsize.max(1));

    let source = source::from_config(&config.source).await.context("opening source")?;
    let source_worker = SourceWorker::new(source, tx.clone(), window, metrics.clone());
    let source_handle = tokio::spawn(source_worker.run());

    tokio::time::sleep(SOURCE_HANDICAP).await;
    state = PipelineState::Running;
    info!(?state, "sink workers starting");

    let mut sink_handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let publisher = publish::from_config(&config.sink).await.context("connecting sink publisher")?;
        let sink_worker = SinkWorker::new(
            worker_id,
            rx.clone(),
            tx.clone(),
            publisher,
            governor.clone(),
            metrics.clone(),
            SinkWorkerConfig {
                records_per_message: config.runtime.records_per_message.max(1),
                record_size_max: config.runtime.record_size_max,
                record_identifier: config.runtime.record_identifier.clone(),
                record_monitor: config.runtime.record_monitor,
                defaults: SinkDefaults {
                    data_source: config.runtime.default_data_source.clone(),
                    entity_type: config.runtime.default_entity_type.clone(),
                },
            },
        );
        sink_handles.push(tokio::spawn(sink_worker.run()));
    }
    drop(tx);
    drop(rx);

    let monitor = Monitor::new(metrics.clone(), config.runtime.monitoring_period_in_seconds);
    let monitor_handle = tokio::spawn(monitor.run());

    // Captured rather than propagated immediately: even a fatal source error must not skip
    // draining the sink workers below, since the source worker still enqueues `EndOfStream` on
    // its way out and the sinks need to observe it, flush, and close cleanly before the process
    // can exit.
    let source_result = source_handle.await.context("source worker task panicked");
    state = PipelineState::Draining;
    info!(?state, "source exhausted, draining sink workers");

    // A single sink worker failing is not fatal to the pipeline: the remaining workers keep
    // draining the queue, and the monitor is what notices and reports reduced throughput.
    for (worker_id, handle) in sink_handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(worker_id, error = ?e, "sink worker exited with an error"),
            Err(e) => tracing::error!(worker_id, error = ?e, "sink worker task panicked"),
        }
    }

    monitor_handle.abort();
    state = PipelineState::Stopped;
    info!(?state, input = metrics.snapshot().input_counter, output = metrics.snapshot().output_counter, "pipeline stopped");

    source_result?.context("source worker failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommonSourceConfig, SourceConfig, UrlSourceConfig};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;

    /// A `Publisher` that keeps every payload it was handed, for assertions. Never used outside
    /// tests; production code always goes through `PublisherBackend`.
    #[derive(Clone, Default)]
    struct VecPublisher {
        received: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Publisher for VecPublisher {
        async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
            self.received.lock().unwrap().push(payload);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn write_ndjson(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    /// Wires a `SourceWorker` and a single `SinkWorker<VecPublisher>` together directly,
    /// bypassing `run`'s `SOURCE_HANDICAP` sleep so the test completes instantly.
    async fn pipe_through(lines: &[&str], window: RecordWindow, records_per_message: usize) -> Vec<Vec<u8>> {
        pipe_through_with_size_max(lines, window, records_per_message, 0).await
    }

    async fn pipe_through_with_size_max(
        lines: &[&str],
        window: RecordWindow,
        records_per_message: usize,
        record_size_max: usize,
    ) -> Vec<Vec<u8>> {
        let file = write_ndjson(lines);
        let input_url = format!("file://{}", file.path().display());
        let source_config = SourceConfig::Json(UrlSourceConfig { input_url, common: CommonSourceConfig::default() });

        let metrics = Arc::new(Metrics::new(1));
        let governor: Arc<dyn Governor> = Arc::new(NoopGovernor);
        let (tx, rx) = async_channel::bounded::<Envelope>(50);

        let source = source::from_config(&source_config).await.unwrap();
        let source_worker = SourceWorker::new(source, tx.clone(), window, metrics.clone());
        let source_handle = tokio::spawn(source_worker.run());

        let publisher = VecPublisher::default();
        let received = publisher.received.clone();
        let sink_worker = SinkWorker::new(
            0,
            rx,
            tx.clone(),
            publisher,
            governor,
            metrics,
            SinkWorkerConfig {
                records_per_message: records_per_message.max(1),
                record_size_max,
                record_identifier: "RECORD_ID".to_string(),
                record_monitor: 0,
                defaults: SinkDefaults { data_source: None, entity_type: None },
            },
        );
        drop(tx);
        let sink_handle = tokio::spawn(sink_worker.run());

        source_handle.await.unwrap().unwrap();
        sink_handle.await.unwrap().unwrap();

        Arc::try_unwrap(received).unwrap().into_inner().unwrap()
    }

    #[tokio::test]
    async fn three_records_k1_produces_three_messages() {
        let out = pipe_through(&[r#"{"A":1}"#, r#"{"A":2}"#, r#"{"A":3}"#], RecordWindow::default(), 1).await;
        assert_eq!(out, vec![br#"{"A":1}"#.to_vec(), br#"{"A":2}"#.to_vec(), br#"{"A":3}"#.to_vec()]);
    }

    #[tokio::test]
    async fn three_records_k2_batches_two_then_one() {
        let out = pipe_through(&[r#"{"A":1}"#, r#"{"A":2}"#, r#"{"A":3}"#], RecordWindow::default(), 2).await;
        assert_eq!(out, vec![br#"[{"A":1},{"A":2}]"#.to_vec(), br#"{"A":3}"#.to_vec()]);
    }

    #[tokio::test]
    async fn record_window_skips_before_min_and_stops_after_max() {
        let lines = [r#"{"A":1}"#, r#"{"A":2}"#, r#"{"A":3}"#, r#"{"A":4}"#, r#"{"A":5}"#];
        let window = RecordWindow { min: Some(2), max: Some(4) };
        let out = pipe_through(&lines, window, 1).await;
        assert_eq!(out, vec![br#"{"A":2}"#.to_vec(), br#"{"A":3}"#.to_vec(), br#"{"A":4}"#.to_vec()]);
    }

    #[tokio::test]
    async fn oversize_record_is_dropped_not_published() {
        let lines = [r#"{"A":1}"#, r#"{"A":"xxxxxxxxxxxxxxxxxxxx"}"#, r#"{"A":2}"#];
        let out = pipe_through_with_size_max(&lines, RecordWindow::default(), 1, 16).await;
        assert_eq!(out, vec![br#"{"A":1}"#.to_vec(), br#"{"A":2}"#.to_vec()]);
    }
}
