use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::Transport;

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads one S3 object as a byte stream. `rest` is the `bucket/key` portion of an `s3://`
/// URL with the scheme already stripped.
///
/// Single-shot `GetObject`, no retry and no resume on a dropped connection: a failure mid-read
/// is treated as fatal, same as any other source error. This mirrors a known limitation in the
/// system this pipeline is modeled on, where the S3 reader was never hardened past a proof of
/// concept.
pub struct S3Transport {
    body: Box<dyn AsyncRead + Send + Unpin>,
}

impl S3Transport {
    pub async fn open(rest: &str) -> Result<Self> {
        let (bucket, key) = rest
            .split_once('/')
            .with_context(|| format!("s3 URL '{rest}' must be of the form bucket/key"))?;
        if key.is_empty() {
            bail!("s3 URL for bucket '{bucket}' is missing an object key");
        }

        let shared_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&shared_config);

        let object = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("GetObject s3://{bucket}/{key}"))?;

        // TODO: does not paginate past the first ByteStream; large objects that the SDK
        // splits into multiple read cycles beyond its internal buffer are not resumed.
        Ok(Self { body: Box::new(object.body.into_async_read()) })
    }
}

#[async_trait]
impl Transport for S3Transport {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self.body.read(&mut buf).await.context("reading S3 object body")?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}
