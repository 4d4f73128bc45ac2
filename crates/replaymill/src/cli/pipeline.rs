//! The ingest pipeline: XES files in, one flat Parquet event table out.
//!
//! Files are processed sequentially, each fully drained before the next.
//! Rows flow reader -> normalizer -> chunk buffer; drained chunks accumulate
//! until every file is read, then the schema is unified once globally and the
//! chunks are converted and written in one staged, atomically committed pass.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use replaymill_sinks::{arrow_schema, build_record_batch, write_event_table};
use replaymill_xes::chunk::ChunkBuffer;
use replaymill_xes::normalize::normalize;
use replaymill_xes::reader::XesReader;
use replaymill_xes::record::EventRecord;
use replaymill_xes::schema::SchemaBuilder;

use crate::cli::error::HelpfulError;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub files: usize,
    pub events: u64,
}

/// Find every `.xes` file under `data_dir`, sorted by path so runs are
/// deterministic regardless of directory iteration order.
pub fn discover_input_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.exists() {
        return Err(HelpfulError::path_not_found(data_dir).into());
    }
    if !data_dir.is_dir() {
        return Err(HelpfulError::not_a_directory(data_dir).into());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xes"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Run the whole pipeline. A structural parse error in any file aborts the
/// run before anything is written, so the previous output stays intact.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    let files = discover_input_files(&config.data_dir)?;
    if files.is_empty() {
        return Err(HelpfulError::no_input_files(&config.data_dir).into());
    }

    let mut schema_builder = SchemaBuilder::new();
    let mut buffer = ChunkBuffer::new(config.chunk_size);
    let mut chunks: Vec<Vec<EventRecord>> = Vec::new();
    let mut total_events: u64 = 0;

    for file in &files {
        info!(file = %file.display(), "processing XES file");
        let reader = XesReader::from_path(file)?;
        let mut file_events: u64 = 0;

        for record in reader {
            let record = record
                .with_context(|| format!("while reading {}", file.display()))?;
            let row = normalize(record);
            schema_builder.observe(&row);
            file_events += 1;
            if let Some(chunk) = buffer.push(row) {
                chunks.push(chunk);
            }
        }

        info!(file = %file.display(), events = file_events, "file drained");
        total_events += file_events;
    }

    if let Some(rest) = buffer.finish() {
        chunks.push(rest);
    }

    if total_events == 0 {
        warn!("no events extracted from {} file(s); nothing written", files.len());
        return Ok(PipelineReport {
            files: files.len(),
            events: 0,
        });
    }

    let schema = schema_builder.unify();
    info!(
        columns = schema.len(),
        chunks = chunks.len(),
        "unified output schema"
    );

    let arrow = arrow_schema(&schema);
    let batches = chunks
        .iter()
        .map(|chunk| build_record_batch(&schema, chunk))
        .collect::<Result<Vec<_>>>()?;

    let rows = write_event_table(&config.output, &arrow, &batches)?;
    info!(
        output = %config.output.display(),
        rows,
        files = files.len(),
        "event table committed"
    );

    Ok(PipelineReport {
        files: files.len(),
        events: rows,
    })
}
