//! Byte-level input. A `Transport` knows nothing about record formats; it just hands the
//! decoder raw chunks until it runs dry.

pub mod file;
pub mod http;
pub mod s3;
pub mod websocket;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send {
    /// Returns the next chunk of raw bytes, or `None` once the input is exhausted.
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub enum TransportBackend {
    File(file::FileTransport),
    Http(http::HttpTransport),
    S3(s3::S3Transport),
    WebSocket(websocket::WebSocketTransport),
}

#[async_trait]
impl Transport for TransportBackend {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            TransportBackend::File(t) => t.read_chunk().await,
            TransportBackend::Http(t) => t.read_chunk().await,
            TransportBackend::S3(t) => t.read_chunk().await,
            TransportBackend::WebSocket(t) => t.read_chunk().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            TransportBackend::File(t) => t.close().await,
            TransportBackend::Http(t) => t.close().await,
            TransportBackend::S3(t) => t.close().await,
            TransportBackend::WebSocket(t) => t.close().await,
        }
    }
}

/// Opens the transport implied by a URL's scheme. Bare paths (no `scheme://`) are treated as
/// local files.
pub async fn open(url: &str) -> Result<TransportBackend> {
    if let Some(rest) = url.strip_prefix("s3://") {
        return Ok(TransportBackend::S3(s3::S3Transport::open(rest).await?));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(TransportBackend::Http(http::HttpTransport::open(url).await?));
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    Ok(TransportBackend::File(file::FileTransport::open(path).await?))
}
