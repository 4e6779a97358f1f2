//! The pipeline's one payload type and its hand-off envelope.
//!
//! A [`Record`] is a string-keyed mapping of scalar JSON values. It is created once by a
//! decoder and mutated exactly once more, by the sink stage's default-field injector, before
//! it is serialized and handed to a publisher.

use std::collections::BTreeMap;

use serde_json::Value;

/// A single decoded entity. Field order is not significant; `BTreeMap` keeps serialization
/// deterministic, which is handy for golden-file tests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Looks up `record_identifier` for use in drop/warning log lines. Falls back to the
    /// literal field name itself when absent, which is at least greppable.
    pub fn identifier(&self, identifier_field: &str) -> String {
        match self.fields.get(identifier_field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("<missing {identifier_field}>"),
        }
    }

    /// Injects `DATA_SOURCE` / `ENTITY_TYPE` defaults if configured and not already present.
    /// The only place a `Record` is ever mutated after decoding.
    pub fn inject_defaults(&mut self, default_data_source: Option<&str>, default_entity_type: Option<&str>) {
        if let Some(ds) = default_data_source {
            self.fields
                .entry("DATA_SOURCE".to_string())
                .or_insert_with(|| Value::String(ds.to_string()));
        }
        if let Some(et) = default_entity_type {
            self.fields
                .entry("ENTITY_TYPE".to_string())
                .or_insert_with(|| Value::String(et.to_string()));
        }
    }

    pub fn to_json_value(&self) -> Value {
        Value::Object(self.fields.clone().into_iter().collect())
    }

    pub fn serialize(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.to_json_value())
    }
}

impl From<serde_json::Map<String, Value>> for Record {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().collect(),
        }
    }
}

/// The hand-off unit that rides the bounded queue between the source and the sink workers.
///
/// `EndOfStream` is enqueued exactly once, by the source, and re-enqueued by each sink worker
/// that observes it so every sibling eventually sees its own copy.
#[derive(Debug, Clone)]
pub enum Envelope {
    Record(Record),
    EndOfStream,
}

/// Inclusive 1-based record window. `None` on either bound means unbounded on that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordWindow {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl RecordWindow {
    /// Given the 1-based ordinal of a just-decoded record, decides what the source should do
    /// with it.
    pub fn decision(&self, ordinal: u64) -> WindowDecision {
        if let Some(min) = self.min {
            if ordinal < min {
                return WindowDecision::Skip;
            }
        }
        if let Some(max) = self.max {
            if ordinal > max {
                return WindowDecision::Stop;
            }
            if ordinal == max {
                return WindowDecision::EmitAndStop;
            }
        }
        WindowDecision::Emit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    Skip,
    Emit,
    EmitAndStop,
    Stop,
}

/// The "make-serializable" transform applied to every non-string Parquet field value: the
/// value is stringified, unless the string form is all-numeric, in which case the numeric
/// value is preserved instead.
pub fn make_serializable(stringified: String) -> Value {
    let looks_numeric = !stringified.is_empty()
        && stringified
            .strip_prefix('-')
            .unwrap_or(&stringified)
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
        && stringified.matches('.').count() <= 1;
    if looks_numeric {
        if let Ok(n) = stringified.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Ok(n) = stringified.parse::<f64>() {
            if let Some(num) = serde_json::Number::from_f64(n) {
                return Value::Number(num);
            }
        }
    }
    Value::String(stringified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn window_min_only_skips_before_bound() {
        let w = RecordWindow { min: Some(3), max: None };
        assert_eq!(w.decision(1), WindowDecision::Skip);
        assert_eq!(w.decision(2), WindowDecision::Skip);
        assert_eq!(w.decision(3), WindowDecision::Emit);
        assert_eq!(w.decision(100), WindowDecision::Emit);
    }

    #[test]
    fn window_min_and_max_stops_after_bound() {
        let w = RecordWindow { min: Some(3), max: Some(5) };
        assert_eq!(w.decision(2), WindowDecision::Skip);
        assert_eq!(w.decision(3), WindowDecision::Emit);
        assert_eq!(w.decision(4), WindowDecision::Emit);
        assert_eq!(w.decision(5), WindowDecision::EmitAndStop);
    }

    #[test]
    fn inject_defaults_does_not_overwrite_existing() {
        let mut fields = BTreeMap::new();
        fields.insert("DATA_SOURCE".to_string(), Value::String("EXISTING".to_string()));
        let mut record = Record::new(fields);
        record.inject_defaults(Some("DEFAULT"), Some("PERSON"));
        assert_eq!(record.fields.get("DATA_SOURCE").unwrap(), "EXISTING");
        assert_eq!(record.fields.get("ENTITY_TYPE").unwrap(), "PERSON");
    }

    #[test]
    fn identifier_falls_back_when_missing() {
        let record = Record::default();
        assert_eq!(record.identifier("RECORD_ID"), "<missing RECORD_ID>");
    }

    #[test]
    fn make_serializable_preserves_numeric_strings_as_numbers() {
        assert_eq!(make_serializable("42".to_string()), Value::Number(42.into()));
        assert_eq!(make_serializable("-3.5".to_string()), json!(-3.5));
        assert_eq!(make_serializable("ABC123".to_string()), Value::String("ABC123".to_string()));
    }
}
