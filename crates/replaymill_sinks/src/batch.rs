//! Row-to-Arrow conversion.
//!
//! Reindexes flattened event records against the unified schema: every row is
//! widened to the full column set, absent keys become nulls (never zero or
//! empty string), and cells are coerced into the column's promoted type.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use replaymill_xes::record::EventRecord;
use replaymill_xes::schema::{ColumnKind, UnifiedSchema};
use replaymill_xes::value::AttrValue;

/// Arrow schema for the unified column set. Every column is nullable: absence
/// is meaningful in this table.
pub fn arrow_schema(schema: &UnifiedSchema) -> Schema {
    let fields: Vec<Field> = schema
        .columns()
        .map(|(name, kind)| {
            let data_type = match kind {
                ColumnKind::Int64 => DataType::Int64,
                ColumnKind::Float64 => DataType::Float64,
                ColumnKind::Utf8 => DataType::Utf8,
                ColumnKind::Timestamp => {
                    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
                }
            };
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

/// Convert one chunk of rows into a RecordBatch laid out per the unified
/// schema.
pub fn build_record_batch(schema: &UnifiedSchema, rows: &[EventRecord]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len());

    for (name, kind) in schema.columns() {
        let column: ArrayRef = match kind {
            ColumnKind::Int64 => {
                let values: Vec<Option<i64>> =
                    rows.iter().map(|row| int_cell(row.get(name))).collect();
                Arc::new(Int64Array::from(values))
            }
            ColumnKind::Float64 => {
                let values: Vec<Option<f64>> =
                    rows.iter().map(|row| float_cell(row.get(name))).collect();
                Arc::new(Float64Array::from(values))
            }
            ColumnKind::Utf8 => {
                let values: Vec<Option<String>> = rows
                    .iter()
                    .map(|row| row.get(name).and_then(AttrValue::render))
                    .collect();
                Arc::new(StringArray::from(values))
            }
            ColumnKind::Timestamp => {
                let values: Vec<Option<i64>> =
                    rows.iter().map(|row| timestamp_cell(row.get(name))).collect();
                Arc::new(TimestampMicrosecondArray::from(values).with_timezone("UTC"))
            }
        };
        columns.push(column);
    }

    RecordBatch::try_new(Arc::new(arrow_schema(schema)), columns)
        .context("Failed to assemble record batch from event rows")
}

fn int_cell(value: Option<&AttrValue>) -> Option<i64> {
    match value {
        Some(AttrValue::Int(i)) => Some(*i),
        _ => None,
    }
}

fn float_cell(value: Option<&AttrValue>) -> Option<f64> {
    match value {
        Some(AttrValue::Float(f)) => Some(*f),
        Some(AttrValue::Int(i)) => Some(*i as f64),
        _ => None,
    }
}

fn timestamp_cell(value: Option<&AttrValue>) -> Option<i64> {
    match value {
        Some(AttrValue::Timestamp(ts)) => Some(ts.timestamp_micros()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::{TimeZone, Utc};
    use replaymill_xes::schema::SchemaBuilder;

    fn record(fields: &[(&str, AttrValue)]) -> EventRecord {
        let mut r = EventRecord::new();
        for (k, v) in fields {
            r.insert(*k, v.clone());
        }
        r
    }

    #[test]
    fn absent_columns_become_nulls_not_defaults() {
        let rows = vec![
            record(&[
                ("event_id", AttrValue::Str("A-0".into())),
                ("x", AttrValue::Int(1)),
            ]),
            record(&[
                ("event_id", AttrValue::Str("B-0".into())),
                ("z", AttrValue::Int(9)),
            ]),
        ];

        let mut builder = SchemaBuilder::new();
        for row in &rows {
            builder.observe(row);
        }
        let schema = builder.unify();

        let batch = build_record_batch(&schema, &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let x = batch
            .column_by_name("x")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(x.value(0), 1);
        assert!(x.is_null(1));

        let z = batch
            .column_by_name("z")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert!(z.is_null(0));
        assert_eq!(z.value(1), 9);
    }

    #[test]
    fn ints_widen_in_float_columns_and_render_in_utf8_columns() {
        let rows = vec![
            record(&[
                ("elo", AttrValue::Int(1500)),
                ("win", AttrValue::Str("true".into())),
            ]),
            record(&[
                ("elo", AttrValue::Float(1512.5)),
                ("win", AttrValue::Int(0)),
            ]),
        ];

        let mut builder = SchemaBuilder::new();
        for row in &rows {
            builder.observe(row);
        }
        let schema = builder.unify();
        let batch = build_record_batch(&schema, &rows).unwrap();

        let elo = batch
            .column_by_name("elo")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(elo.value(0), 1500.0);
        assert_eq!(elo.value(1), 1512.5);

        let win = batch
            .column_by_name("win")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(win.value(0), "true");
        assert_eq!(win.value(1), "0");
    }

    #[test]
    fn timestamps_are_utc_microseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let rows = vec![
            record(&[("ts", AttrValue::Timestamp(ts))]),
            record(&[("ts", AttrValue::Missing)]),
        ];

        let mut builder = SchemaBuilder::new();
        for row in &rows {
            builder.observe(row);
        }
        let schema = builder.unify();
        let batch = build_record_batch(&schema, &rows).unwrap();

        assert_eq!(
            batch.schema().field(0).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );

        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(col.value(0), ts.timestamp_micros());
        assert!(col.is_null(1));
    }
}
