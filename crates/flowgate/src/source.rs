//! The source stage: a `Decoder` sitting on top of a `Transport`, producing one `Record` at a
//! time regardless of whether the underlying format decodes incrementally or all at once.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::decode::{Decoder, DecoderBackend, avro::AvroDecoder, csv::CsvDecoder, gzip_ndjson::GzipNdjsonDecoder, ndjson::NdjsonDecoder, parquet::ParquetDecoder};
use crate::record::Record;
use crate::transport::{self, Transport, TransportBackend, websocket::WebSocketTransport};

#[async_trait]
pub trait Source: Send {
    async fn next_record(&mut self) -> Result<Option<Record>>;
    async fn close(&mut self) -> Result<()>;
}

pub struct DecodingSource {
    transport: TransportBackend,
    decoder: DecoderBackend,
    pending: VecDeque<Record>,
    exhausted: bool,
}

impl DecodingSource {
    pub fn new(transport: TransportBackend, decoder: DecoderBackend) -> Self {
        Self { transport, decoder, pending: VecDeque::new(), exhausted: false }
    }
}

#[async_trait]
impl Source for DecodingSource {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            match self.transport.read_chunk().await? {
                Some(chunk) => {
                    self.pending.extend(self.decoder.decode(&chunk)?);
                }
                None => {
                    self.exhausted = true;
                    self.pending.extend(self.decoder.finish()?);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

/// Resolves a `SourceConfig` variant into a ready-to-pull `Source`. This is the one place the
/// format is paired with the transport its input URL implies.
pub async fn from_config(config: &SourceConfig) -> Result<Box<dyn Source>> {
    let source: Box<dyn Source> = match config {
        SourceConfig::Json(c) => {
            let transport = transport::open(&c.input_url).await?;
            Box::new(DecodingSource::new(transport, DecoderBackend::Ndjson(NdjsonDecoder::new())))
        }
        SourceConfig::GzippedJson(c) => {
            let transport = transport::open(&c.input_url).await?;
            Box::new(DecodingSource::new(transport, DecoderBackend::GzipNdjson(GzipNdjsonDecoder::new())))
        }
        SourceConfig::Csv(c) => {
            let transport = transport::open(&c.input_url).await?;
            let decoder = CsvDecoder::new(c.common.csv_delimiter, c.common.csv_rows_in_chunk);
            Box::new(DecodingSource::new(transport, DecoderBackend::Csv(decoder)))
        }
        SourceConfig::Parquet(c) => {
            let transport = transport::open(&c.input_url).await?;
            Box::new(DecodingSource::new(transport, DecoderBackend::Parquet(ParquetDecoder::new())))
        }
        SourceConfig::Avro(c) => {
            let transport = transport::open(&c.input_url).await?;
            Box::new(DecodingSource::new(transport, DecoderBackend::Avro(AvroDecoder::new())))
        }
        SourceConfig::WebSocket(c) => {
            let transport = TransportBackend::WebSocket(WebSocketTransport::bind(c).await?);
            Box::new(DecodingSource::new(transport, DecoderBackend::Ndjson(NdjsonDecoder::new())))
        }
    };
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ndjson::NdjsonDecoder;
    use std::io::Write;

    #[tokio::test]
    async fn decoding_source_yields_records_then_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"A\":1}}").unwrap();
        writeln!(file, "{{\"A\":2}}").unwrap();

        let transport = transport::open(&format!("file://{}", file.path().display())).await.unwrap();
        let mut source = DecodingSource::new(transport, DecoderBackend::Ndjson(NdjsonDecoder::new()));

        let first = source.next_record().await.unwrap().unwrap();
        assert_eq!(first.fields.get("A").unwrap(), 1);
        let second = source.next_record().await.unwrap().unwrap();
        assert_eq!(second.fields.get("A").unwrap(), 2);
        assert!(source.next_record().await.unwrap().is_none());
    }
}
