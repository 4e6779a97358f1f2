use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};

use super::Publisher;

/// Line-delimited write to the process's standard output. No batching of its own — a batched
/// JSON array arrives here as a single already-composed payload and is written as one line.
pub struct StdoutPublisher {
    stdout: Stdout,
}

impl StdoutPublisher {
    pub fn new() -> Self {
        Self { stdout: tokio::io::stdout() }
    }
}

impl Default for StdoutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stdout.write_all(&payload).await.context("writing to stdout")?;
        self.stdout.write_all(b"\n").await.context("writing newline to stdout")?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stdout.flush().await.context("flushing stdout")
    }
}
