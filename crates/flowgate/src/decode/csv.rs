use std::collections::BTreeMap;
use std::io::Cursor;

use anyhow::{Context, Result};
use serde_json::Value;

use super::Decoder;
use crate::record::Record;

/// CSV, read line by line. Column values are always strings, trimmed of leading whitespace;
/// a field whose value is the empty string is dropped from the resulting record rather than
/// kept as `""`. Rows accumulate into `pending` in batches of `rows_in_chunk` before the
/// caller sees them, mirroring the format's chunked-read framing.
pub struct CsvDecoder {
    delimiter: u8,
    rows_in_chunk: usize,
    header: Option<Vec<String>>,
    carry: Vec<u8>,
    /// Tracks whether the byte scanner is inside a quoted field, so a `\n` embedded in a
    /// quoted value (valid CSV) isn't mistaken for a row boundary. Persists across `decode`
    /// calls since a quoted field can span a chunk boundary.
    in_quotes: bool,
    row_batch: Vec<Record>,
}

impl CsvDecoder {
    pub fn new(delimiter: char, rows_in_chunk: usize) -> Self {
        Self {
            delimiter: delimiter as u8,
            rows_in_chunk: rows_in_chunk.max(1),
            header: None,
            carry: Vec::new(),
            in_quotes: false,
            row_batch: Vec::new(),
        }
    }

    fn parse_csv_line(&self, line: &str) -> Result<Vec<String>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_reader(Cursor::new(line));
        let mut iter = reader.records();
        match iter.next() {
            Some(record) => Ok(record.context("parsing CSV row")?.iter().map(str::to_string).collect()),
            None => Ok(Vec::new()),
        }
    }

    fn ingest_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let columns = self.parse_csv_line(line)?;
        if self.header.is_none() {
            self.header = Some(columns);
            return Ok(());
        }
        let header = self.header.as_ref().unwrap();
        let mut fields = BTreeMap::new();
        for (name, value) in header.iter().zip(columns.iter()) {
            let trimmed = value.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            fields.insert(name.clone(), Value::String(trimmed.to_string()));
        }
        self.row_batch.push(Record::new(fields));
        Ok(())
    }
}

impl Decoder for CsvDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.carry.extend_from_slice(chunk);

        let mut consumed = 0;
        for i in 0..self.carry.len() {
            match self.carry[i] {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => {
                    let line = std::str::from_utf8(&self.carry[consumed..i])
                        .context("non-UTF-8 byte in CSV input")?
                        .trim_end_matches('\r')
                        .to_string();
                    self.ingest_line(&line)?;
                    consumed = i + 1;
                }
                _ => {}
            }
        }
        self.carry.drain(..consumed);

        if self.row_batch.len() >= self.rows_in_chunk {
            Ok(std::mem::take(&mut self.row_batch))
        } else {
            Ok(Vec::new())
        }
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        if !self.carry.is_empty() {
            let leftover = std::mem::take(&mut self.carry);
            let line = std::str::from_utf8(&leftover).context("non-UTF-8 byte in CSV input")?.to_string();
            self.ingest_line(&line)?;
        }
        Ok(std::mem::take(&mut self.row_batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_empty_fields_and_trims_leading_whitespace() {
        let mut decoder = CsvDecoder::new(',', 10);
        decoder.decode(b"A,B\n1,\n2, x\n").unwrap();
        let records = decoder.finish().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields.get("A").unwrap(), "1");
        assert!(!records[0].fields.contains_key("B"));
        assert_eq!(records[1].fields.get("B").unwrap(), "x");
    }

    #[test]
    fn quoted_field_with_embedded_newline_stays_one_row() {
        let mut decoder = CsvDecoder::new(',', 10);
        decoder.decode(b"A,B\n1,\"line1\nline2\"\n2,x\n").unwrap();
        let records = decoder.finish().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields.get("B").unwrap(), "line1\nline2");
        assert_eq!(records[1].fields.get("A").unwrap(), "2");
    }

    #[test]
    fn respects_custom_delimiter() {
        let mut decoder = CsvDecoder::new(';', 10);
        decoder.decode(b"A;B\n1;2\n").unwrap();
        let records = decoder.finish().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields.get("B").unwrap(), "2");
    }

    #[test]
    fn batches_rows_by_rows_in_chunk() {
        let mut decoder = CsvDecoder::new(',', 2);
        let first = decoder.decode(b"A\n1\n2\n3\n").unwrap();
        assert_eq!(first.len(), 2);
        let rest = decoder.finish().unwrap();
        assert_eq!(rest.len(), 1);
    }
}
