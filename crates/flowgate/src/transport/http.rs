use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use super::Transport;

/// HTTP GET streamed in chunks. No retry: a failed request or a stream error aborts the
/// source entirely, per the pipeline's fatal-source-error policy.
pub struct HttpTransport {
    stream: std::pin::Pin<Box<dyn futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
}

impl HttpTransport {
    pub async fn open(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("building HTTP client")?;
        let response = client.get(url).send().await.with_context(|| format!("GET {url}"))?;
        if !response.status().is_success() {
            bail!("GET {url} returned {}", response.status());
        }
        Ok(Self { stream: Box::pin(response.bytes_stream()) })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes.to_vec())),
            Some(Err(e)) => Err(e).context("reading HTTP response body"),
            None => Ok(None),
        }
    }
}
