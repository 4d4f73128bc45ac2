//! End-to-end pipeline tests: XES fixtures in, Parquet read back out.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::tempdir;

use replaymill::cli::pipeline::{run, PipelineConfig};

const FILE_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log xes.version="1.0" xmlns="http://www.xes-standard.org/">
  <trace>
    <string key="concept:name" value="M1"/>
    <string key="match_id" value="g-100"/>
    <string key="player_id" value="p-1"/>
    <string key="elo" value="1500"/>
    <string key="civilization" value="Franks"/>
    <string key="win" value="true"/>
    <event>
      <string key="concept:name" value="BuildHouse"/>
      <date key="time:timestamp" value="2024-01-01T00:00:00"/>
      <int key="amount" value="1"/>
      <string key="x" value="alpha"/>
    </event>
    <event>
      <string key="concept:name" value="BuildBarracks"/>
      <date key="time:timestamp" value="2024-01-01T00:01:00"/>
      <int key="amount" value="2"/>
    </event>
  </trace>
</log>"#;

const FILE_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log xes.version="1.0" xmlns="http://www.xes-standard.org/">
  <trace>
    <string key="concept:name" value="M2"/>
    <string key="match_id" value="g-200"/>
    <string key="player_id" value="p-2"/>
    <string key="strategy" value="rush"/>
    <event>
      <string key="concept:name" value="Attack"/>
      <date key="time:timestamp" value="2024-01-02T10:00:00+00:00"/>
      <string key="z" value="beta"/>
    </event>
  </trace>
</log>"#;

fn write_fixture(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn read_parquet(path: &Path) -> Vec<RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> &'a StringArray {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
}

#[test]
fn ingest_unifies_schema_across_files() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    write_fixture(&data_dir, "a.xes", FILE_A);
    write_fixture(&data_dir, "b.xes", FILE_B);

    let output = dir.path().join("warehouse").join("events_raw.parquet");
    let report = run(&PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 2,
    })
    .unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.events, 3);

    let batches = read_parquet(&output);
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 3);

    // Preferred columns lead, then remaining columns in first-observed order.
    let schema = batches[0].schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "event_id",
            "ts",
            "activity",
            "match_id",
            "player_id",
            "civilization",
            "elo",
            "case_id",
            "strategy",
            "win",
            "amount",
            "x",
            "concept:name",
            "z",
        ]
    );

    // Rows from file A are null in z; rows from file B are null in x.
    let first = &batches[0];
    let ids = string_column(first, "event_id");
    assert_eq!(ids.value(0), "M1-0");
    assert_eq!(ids.value(1), "M1-1");

    let x = string_column(first, "x");
    assert_eq!(x.value(0), "alpha");
    assert!(x.is_null(1));

    let elo = string_column(first, "elo");
    assert_eq!(elo.value(0), "1500");
    assert_eq!(elo.value(1), "1500");

    let amount = first
        .column_by_name("amount")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(amount.value(0), 1);
    assert_eq!(amount.value(1), 2);

    let ts = first
        .column_by_name("ts")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap();
    // Second event is one minute after the first.
    assert_eq!(ts.value(1) - ts.value(0), 60_000_000);

    let last = batches.last().unwrap();
    let last_row = last.num_rows() - 1;
    let ids = string_column(last, "event_id");
    assert_eq!(ids.value(last_row), "M2-0");
    let z = string_column(last, "z");
    assert_eq!(z.value(last_row), "beta");
    let x = string_column(last, "x");
    assert!(x.is_null(last_row));
    let strategy = string_column(last, "strategy");
    assert_eq!(strategy.value(last_row), "rush");
}

#[test]
fn event_ids_are_unique_across_the_table() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    write_fixture(&data_dir, "a.xes", FILE_A);
    write_fixture(&data_dir, "b.xes", FILE_B);

    let output = dir.path().join("events.parquet");
    run(&PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 1,
    })
    .unwrap();

    let mut seen = std::collections::HashSet::new();
    for batch in read_parquet(&output) {
        let ids = string_column(&batch, "event_id");
        for i in 0..ids.len() {
            assert!(seen.insert(ids.value(i).to_string()), "duplicate id");
        }
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn rerun_is_deterministic() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    write_fixture(&data_dir, "a.xes", FILE_A);
    write_fixture(&data_dir, "b.xes", FILE_B);

    let output = dir.path().join("events.parquet");
    let config = PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 100,
    };

    run(&config).unwrap();
    let first = read_parquet(&output);

    run(&config).unwrap();
    let second = read_parquet(&output);

    assert_eq!(first, second);
}

#[test]
fn no_input_files_is_fatal_before_processing() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();

    let output = dir.path().join("events.parquet");
    let err = run(&PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 100,
    })
    .unwrap_err();

    assert!(err.to_string().contains("No .xes files"));
    assert!(!output.exists());
}

#[test]
fn structural_error_aborts_without_writing_output() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    write_fixture(&data_dir, "a.xes", FILE_A);
    write_fixture(
        &data_dir,
        "broken.xes",
        "<log><event><string key=\"concept:name\" value=\"A\"/></event></log>",
    );

    let output = dir.path().join("events.parquet");
    let err = run(&PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 100,
    })
    .unwrap_err();

    assert!(err.to_string().contains("broken.xes"));
    assert!(!output.exists());
}

#[test]
fn empty_log_writes_nothing() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    write_fixture(&data_dir, "empty.xes", "<log></log>");

    let output = dir.path().join("events.parquet");
    let report = run(&PipelineConfig {
        data_dir,
        output: output.clone(),
        chunk_size: 100,
    })
    .unwrap();

    assert_eq!(report.events, 0);
    assert!(!output.exists());
}
