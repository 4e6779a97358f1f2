//! Turns raw transport chunks into decoded [`Record`](crate::record::Record) values.
//!
//! Line-oriented formats (NDJSON, gzipped NDJSON, CSV) decode incrementally as chunks arrive.
//! Block formats (Parquet, Avro) need the whole object before anything can be parsed — their
//! footers live at the end of the stream — so they accumulate bytes in `decode` and only
//! produce records in `finish`.

pub mod avro;
pub mod csv;
pub mod gzip_ndjson;
pub mod ndjson;
pub mod parquet;

use anyhow::Result;

use crate::record::Record;

pub trait Decoder: Send {
    /// Feeds one chunk of bytes in, returns any records that became decodable as a result.
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>>;

    /// Called once, after the transport reports end of input. Flushes any buffered partial
    /// record (a trailing line with no terminating newline, or a fully-buffered block format).
    fn finish(&mut self) -> Result<Vec<Record>>;
}

pub enum DecoderBackend {
    Ndjson(ndjson::NdjsonDecoder),
    GzipNdjson(gzip_ndjson::GzipNdjsonDecoder),
    Csv(csv::CsvDecoder),
    Parquet(parquet::ParquetDecoder),
    Avro(avro::AvroDecoder),
}

impl Decoder for DecoderBackend {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        match self {
            DecoderBackend::Ndjson(d) => d.decode(chunk),
            DecoderBackend::GzipNdjson(d) => d.decode(chunk),
            DecoderBackend::Csv(d) => d.decode(chunk),
            DecoderBackend::Parquet(d) => d.decode(chunk),
            DecoderBackend::Avro(d) => d.decode(chunk),
        }
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        match self {
            DecoderBackend::Ndjson(d) => d.finish(),
            DecoderBackend::GzipNdjson(d) => d.finish(),
            DecoderBackend::Csv(d) => d.finish(),
            DecoderBackend::Parquet(d) => d.finish(),
            DecoderBackend::Avro(d) => d.finish(),
        }
    }
}
