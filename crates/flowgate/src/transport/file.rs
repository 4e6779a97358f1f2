use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{self, AsyncReadExt};

use super::Transport;

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads a local file in fixed-size chunks. Async, non-blocking: the `File` is a tokio file
/// handle wrapped in a `BufReader`.
pub struct FileTransport {
    reader: io::BufReader<File>,
}

impl FileTransport {
    pub async fn open(path: &str) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening input file '{path}'"))?;
        Ok(Self { reader: io::BufReader::new(file) })
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self.reader.read(&mut buf).await.context("reading from input file")?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_file_contents_then_returns_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let mut transport = FileTransport::open(file.path().to_str().unwrap()).await.unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = transport.read_chunk().await.unwrap() {
            collected.extend(chunk);
        }
        assert_eq!(collected, b"hello world");
    }
}
