use anyhow::{Context, Result};
use flate2::{Decompress, FlushDecompress, Status};

use super::Decoder;
use super::ndjson::NdjsonDecoder;
use crate::record::Record;

const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Transparent gunzip in front of [`NdjsonDecoder`]. Uses `flate2`'s low-level `Decompress`
/// so it can be fed arbitrary, non-gzip-frame-aligned chunks as they arrive from the
/// transport.
pub struct GzipNdjsonDecoder {
    inflater: Decompress,
    inner: NdjsonDecoder,
}

impl GzipNdjsonDecoder {
    pub fn new() -> Self {
        Self { inflater: Decompress::new(false), inner: NdjsonDecoder::new() }
    }
}

impl Default for GzipNdjsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GzipNdjsonDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut input_offset = 0;
        let mut out = vec![0u8; OUTPUT_BUFFER_SIZE];

        while input_offset < chunk.len() {
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();

            let status = self
                .inflater
                .decompress(&chunk[input_offset..], &mut out, FlushDecompress::None)
                .context("gzip decompression failed")?;

            input_offset += (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            if produced > 0 {
                records.extend(self.inner.decode(&out[..produced])?);
            }

            if status == Status::StreamEnd {
                break;
            }
            if produced == 0 && self.inflater.total_in() - before_in == 0 {
                // no forward progress possible; avoid spinning
                break;
            }
        }
        Ok(records)
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_gzip_compressed_ndjson() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"{\"A\":1}\n{\"A\":2}\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = GzipNdjsonDecoder::new();
        let mut records = decoder.decode(&compressed).unwrap();
        records.extend(decoder.finish().unwrap());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields.get("A").unwrap(), 1);
        assert_eq!(records[1].fields.get("A").unwrap(), 2);
    }
}
