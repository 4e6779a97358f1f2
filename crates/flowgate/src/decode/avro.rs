use std::io::Cursor;

use anyhow::{Context, Result, bail};
use apache_avro::types::Value as AvroValue;
use apache_avro::Reader as AvroReader;
use serde_json::Value;

use super::Decoder;
use crate::record::Record;

/// Avro's object container format carries its own embedded schema, but the reader still needs
/// the whole block to validate the sync markers, so this accumulates like the Parquet decoder
/// and parses only in `finish`.
#[derive(Default)]
pub struct AvroDecoder {
    buffer: Vec<u8>,
}

impl AvroDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn avro_to_json(value: AvroValue) -> Result<Value> {
        Ok(match value {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(b),
            AvroValue::Int(i) => Value::from(i),
            AvroValue::Long(i) => Value::from(i),
            AvroValue::Float(f) => serde_json::Number::from_f64(f as f64).map(Value::Number).unwrap_or(Value::Null),
            AvroValue::Double(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            AvroValue::String(s) | AvroValue::Enum(_, s) => Value::String(s),
            AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
            AvroValue::Union(_, inner) => Self::avro_to_json(*inner)?,
            AvroValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Self::avro_to_json(item)?);
                }
                Value::Array(out)
            }
            AvroValue::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, Self::avro_to_json(v)?);
                }
                Value::Object(out)
            }
            AvroValue::Record(fields) => {
                let mut out = serde_json::Map::with_capacity(fields.len());
                for (k, v) in fields {
                    out.insert(k, Self::avro_to_json(v)?);
                }
                Value::Object(out)
            }
            other => bail!("unsupported Avro value variant: {other:?}"),
        })
    }
}

impl Decoder for AvroDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.buffer.extend_from_slice(chunk);
        Ok(Vec::new())
    }

    fn finish(&mut self) -> Result<Vec<Record>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let buffer = std::mem::take(&mut self.buffer);
        let reader = AvroReader::new(Cursor::new(buffer)).context("reading Avro container header")?;
        let mut records = Vec::new();
        for value in reader {
            let value = value.context("decoding Avro record")?;
            match Self::avro_to_json(value)? {
                Value::Object(map) => records.push(Record::from(map)),
                other => bail!("expected Avro record to decode to a JSON object, got {other}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avro_to_json_converts_scalars() {
        assert_eq!(AvroDecoder::avro_to_json(AvroValue::Null).unwrap(), Value::Null);
        assert_eq!(AvroDecoder::avro_to_json(AvroValue::Boolean(true)).unwrap(), Value::Bool(true));
        assert_eq!(AvroDecoder::avro_to_json(AvroValue::Long(7)).unwrap(), Value::from(7));
        assert_eq!(AvroDecoder::avro_to_json(AvroValue::String("hi".to_string())).unwrap(), Value::String("hi".to_string()));
    }

    #[test]
    fn avro_to_json_unwraps_union() {
        let wrapped = AvroValue::Union(1, Box::new(AvroValue::String("present".to_string())));
        assert_eq!(AvroDecoder::avro_to_json(wrapped).unwrap(), Value::String("present".to_string()));
    }

    #[test]
    fn avro_to_json_converts_record_to_object() {
        let record = AvroValue::Record(vec![
            ("A".to_string(), AvroValue::Long(1)),
            ("B".to_string(), AvroValue::String("x".to_string())),
        ]);
        let value = AvroDecoder::avro_to_json(record).unwrap();
        assert_eq!(value, serde_json::json!({"A": 1, "B": "x"}));
    }

    #[test]
    fn finish_on_empty_buffer_yields_no_records() {
        let mut decoder = AvroDecoder::new();
        assert_eq!(decoder.finish().unwrap(), Vec::new());
    }
}
