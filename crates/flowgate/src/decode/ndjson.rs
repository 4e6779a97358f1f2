use anyhow::{Context, Result};

use super::Decoder;
use crate::record::Record;

/// Line-delimited JSON. Lines may straddle chunk boundaries, so incomplete trailing bytes are
/// held over to the next `decode` call (or to `finish` at end of input).
#[derive(Default)]
pub struct NdjsonDecoder {
    carry: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_line(line: &[u8]) -> Result<Option<Record>> {
        let text = std::str::from_utf8(line).context("non-UTF-8 byte in NDJSON input")?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(trimmed).with_context(|| format!("parsing NDJSON line: {trimmed}"))?;
        Ok(Some(Record::from(map)))
    }
}

impl Decoder for NdjsonDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.carry.extend_from_slice(chunk);
        let mut records = Vec::new();

        while let Some(pos) = memchr::memchr(b'\n', &self.carry) {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            if let Some(record) = Self::parse_line(&line[..line.len() - 1])? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        if self.carry.is_empty() {
            return Ok(Vec::new());
        }
        let leftover = std::mem::take(&mut self.carry);
        Ok(Self::parse_line(&leftover)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_lines_across_chunks() {
        let mut decoder = NdjsonDecoder::new();
        let mut records = decoder.decode(b"{\"A\":1}\n{\"A\":2").unwrap();
        assert_eq!(records.len(), 1);
        records.extend(decoder.decode(b"}\n").unwrap());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].fields.get("A").unwrap(), 2);
    }

    #[test]
    fn skips_empty_lines() {
        let mut decoder = NdjsonDecoder::new();
        let records = decoder.decode(b"{\"A\":1}\n\n{\"A\":2}\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn finish_flushes_trailing_line_without_newline() {
        let mut decoder = NdjsonDecoder::new();
        decoder.decode(b"{\"A\":1}\n{\"A\":2}").unwrap();
        let records = decoder.finish().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields.get("A").unwrap(), 2);
    }

    #[test]
    fn rejects_malformed_json_line() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.decode(b"not json\n").is_err());
    }
}
