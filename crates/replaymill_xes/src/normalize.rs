//! Timestamp coercion for raw event records.
//!
//! The reader leaves timestamps as the raw text it found; everything else
//! already carries its discovered type. Only the timestamp is unified here,
//! because it drives elapsed-time metrics downstream. Numeric strictness for
//! other fields is deferred to the consuming layer.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::reader::TIMESTAMP_FIELD;
use crate::record::EventRecord;
use crate::value::AttrValue;

/// Coerce the `ts` field to a UTC datetime. Unparsable or missing timestamps
/// leave the field null; the row always survives.
pub fn normalize(mut record: EventRecord) -> EventRecord {
    let coerced = match record.get(TIMESTAMP_FIELD) {
        Some(AttrValue::Str(raw)) => match parse_timestamp(raw) {
            Some(ts) => AttrValue::Timestamp(ts),
            None => {
                warn!(raw = %raw, "unparsable event timestamp, nulled");
                AttrValue::Missing
            }
        },
        Some(other) => other.clone(),
        None => return record,
    };
    record.insert(TIMESTAMP_FIELD, coerced);
    record
}

/// XES timestamps are ISO 8601 with an offset; some exporters drop the offset
/// or use a space separator. Naive forms are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc3339_with_offset_converts_to_utc() {
        let mut record = EventRecord::new();
        record.insert(TIMESTAMP_FIELD, "2024-01-01T01:00:00.000+01:00".into());

        let normalized = normalize(record);
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            normalized.get(TIMESTAMP_FIELD),
            Some(&AttrValue::Timestamp(expected))
        );
    }

    #[test]
    fn naive_timestamp_is_taken_as_utc() {
        let mut record = EventRecord::new();
        record.insert(TIMESTAMP_FIELD, "2024-01-01T00:01:00".into());

        let normalized = normalize(record);
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        assert_eq!(
            normalized.get(TIMESTAMP_FIELD),
            Some(&AttrValue::Timestamp(expected))
        );
    }

    #[test]
    fn garbage_timestamp_becomes_null_and_row_survives() {
        let mut record = EventRecord::new();
        record.insert("activity", "BuildHouse".into());
        record.insert(TIMESTAMP_FIELD, "not-a-time".into());

        let normalized = normalize(record);
        assert_eq!(normalized.get(TIMESTAMP_FIELD), Some(&AttrValue::Missing));
        assert_eq!(
            normalized.get("activity"),
            Some(&AttrValue::Str("BuildHouse".into()))
        );
    }

    #[test]
    fn record_without_timestamp_is_untouched() {
        let mut record = EventRecord::new();
        record.insert("activity", "BuildHouse".into());

        let normalized = normalize(record.clone());
        assert_eq!(normalized, record);
    }
}
