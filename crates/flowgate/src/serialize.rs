//! Turns one or more `Record`s into the wire payload a `Publisher` accepts: a single JSON
//! object when `records_per_message == 1`, or a JSON array `[obj,...]` when batching.

use anyhow::Result;

use crate::record::Record;

/// Serializes a single record to a standalone JSON object payload.
pub fn serialize_one(record: &Record) -> Result<Vec<u8>> {
    Ok(record.serialize()?)
}

/// Frames `records_per_message` records as one JSON array, by hand, without re-parsing each
/// already-encoded object: brackets plus the objects plus `n-1` commas.
pub fn serialize_batch(records: &[Record]) -> Result<Vec<u8>> {
    let encoded: Vec<Vec<u8>> = records.iter().map(Record::serialize).collect::<serde_json::Result<_>>()?;
    let commas = encoded.len().saturating_sub(1);
    let capacity = 2 + encoded.iter().map(Vec::len).sum::<usize>() + commas;

    let mut payload = Vec::with_capacity(capacity);
    payload.push(b'[');
    for (i, item) in encoded.iter().enumerate() {
        if i > 0 {
            payload.push(b',');
        }
        payload.extend_from_slice(item);
    }
    payload.push(b']');
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(n: i64) -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("A".to_string(), json!(n));
        Record::new(fields)
    }

    #[test]
    fn single_record_serializes_to_bare_object() {
        let payload = serialize_one(&record(1)).unwrap();
        assert_eq!(payload, br#"{"A":1}"#);
    }

    #[test]
    fn batch_of_three_frames_as_array() {
        let records = vec![record(1), record(2), record(3)];
        let payload = serialize_batch(&records).unwrap();
        assert_eq!(payload, br#"[{"A":1},{"A":2},{"A":3}]"#);
    }

    #[test]
    fn empty_batch_is_empty_array() {
        let payload = serialize_batch(&[]).unwrap();
        assert_eq!(payload, b"[]");
    }

    #[test]
    fn single_element_batch_has_no_commas() {
        let payload = serialize_batch(&[record(1)]).unwrap();
        assert_eq!(payload, br#"[{"A":1}]"#);
    }
}
