//! The governor is the pipeline's one pluggable backpressure hook: sink workers call
//! `govern()` before every publish, and it is shared across all of them, so implementations
//! must be safe under concurrent invocation. The core ships only the no-op default; an
//! external rate limiter or permit source is expected to replace it at start-up.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Governor: Send + Sync {
    /// May block or delay. Called before each publish attempt.
    async fn govern(&self) -> Result<()> {
        Ok(())
    }

    /// Idempotent. Called once per worker at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopGovernor;

#[async_trait]
impl Governor for NoopGovernor {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_governor_never_blocks() {
        let governor = NoopGovernor;
        governor.govern().await.unwrap();
        governor.close().await.unwrap();
    }
}
