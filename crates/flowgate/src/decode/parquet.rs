use anyhow::{Context, Result};
use bytes::Bytes;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use serde_json::Value;

use super::Decoder;
use crate::record::{Record, make_serializable};

/// Parquet has its footer at the end of the file, so nothing can be parsed until every byte
/// has arrived. `decode` only accumulates; the actual row materialization happens in
/// `finish`.
#[derive(Default)]
pub struct ParquetDecoder {
    buffer: Vec<u8>,
}

impl ParquetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_to_value(field: &Field) -> Value {
        match field {
            Field::Null => Value::Null,
            Field::Bool(b) => Value::Bool(*b),
            Field::Str(s) => Value::String(s.clone()),
            other => make_serializable(other.to_string()),
        }
    }
}

impl Decoder for ParquetDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.buffer.extend_from_slice(chunk);
        Ok(Vec::new())
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let bytes = Bytes::from(std::mem::take(&mut self.buffer));
        let reader = SerializedFileReader::new(bytes).context("opening Parquet footer")?;
        let mut records = Vec::new();
        for row in reader.get_row_iter(None).context("iterating Parquet row groups")? {
            let row = row.context("reading Parquet row")?;
            let mut fields = std::collections::BTreeMap::new();
            for (name, field) in row.get_column_iter() {
                fields.insert(name.clone(), Self::field_to_value(field));
            }
            records.push(Record::new(fields));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_to_value_keeps_null_bool_and_string_as_is() {
        assert_eq!(ParquetDecoder::field_to_value(&Field::Null), Value::Null);
        assert_eq!(ParquetDecoder::field_to_value(&Field::Bool(true)), Value::Bool(true));
        assert_eq!(ParquetDecoder::field_to_value(&Field::Str("hello".to_string())), Value::String("hello".to_string()));
    }

    #[test]
    fn field_to_value_stringifies_then_unstringifies_numeric_types() {
        // Any non-null/bool/string field goes through `to_string()` then `make_serializable`,
        // so an integer column comes back out as a JSON number, not a string.
        assert_eq!(ParquetDecoder::field_to_value(&Field::Long(42)), Value::Number(42.into()));
        assert_eq!(ParquetDecoder::field_to_value(&Field::Int(7)), Value::Number(7.into()));
    }

    #[test]
    fn finish_on_empty_buffer_yields_no_records() {
        let mut decoder = ParquetDecoder::new();
        assert_eq!(decoder.finish().unwrap(), Vec::new());
    }
}
