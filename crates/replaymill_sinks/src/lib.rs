//! Columnar sinks for the flat event table.
//!
//! Sinks receive Arrow RecordBatches and stage them into a temp file that is
//! atomically renamed over the final path on commit. A failed or aborted run
//! never leaves a partially written final table, and each run fully replaces
//! the previous output.

use anyhow::{bail, Context, Result};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod batch;

pub use batch::{arrow_schema, build_record_batch};

/// Parquet sink with temp-file staging.
pub struct ParquetSink {
    final_path: PathBuf,
    writer: Option<parquet::arrow::arrow_writer::ArrowWriter<std::fs::File>>,
    rows_written: u64,
    temp_path: Option<PathBuf>,
    committed: bool,
}

impl ParquetSink {
    pub fn new(final_path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&final_path)?;
        Ok(Self {
            final_path,
            writer: None,
            rows_written: 0,
            temp_path: None,
            committed: false,
        })
    }

    fn init(&mut self, schema: &Schema) -> Result<()> {
        let temp_path = staging_path(&self.final_path)?;
        info!(
            "Initializing Parquet sink: {} (temp: {})",
            self.final_path.display(),
            temp_path.display()
        );

        let file = std::fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp parquet file: {}",
                temp_path.display()
            )
        })?;

        let props = parquet::file::properties::WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let writer = parquet::arrow::arrow_writer::ArrowWriter::try_new(
            file,
            Arc::new(schema.clone()),
            Some(props),
        )
        .context("Failed to create Parquet writer")?;

        self.writer = Some(writer);
        self.temp_path = Some(temp_path);
        Ok(())
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Parquet sink not initialized"))?;

        writer
            .write(batch)
            .context("Failed to write batch to Parquet")?;

        let rows = batch.num_rows() as u64;
        self.rows_written += rows;
        debug!(
            "Wrote {} rows to Parquet (total: {})",
            rows, self.rows_written
        );

        Ok(rows)
    }

    fn prepare(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close().context("Failed to close Parquet writer")?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(temp_path) = &self.temp_path {
            std::fs::rename(temp_path, &self.final_path).with_context(|| {
                format!(
                    "Failed to rename {} -> {}",
                    temp_path.display(),
                    self.final_path.display()
                )
            })?;
            info!(
                "Committed Parquet sink: {} ({} rows)",
                self.final_path.display(),
                self.rows_written
            );
            self.committed = true;
        }
        self.temp_path = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.committed && self.final_path.exists() {
            let _ = std::fs::remove_file(&self.final_path);
            warn!(
                "Rolled back Parquet committed file: {}",
                self.final_path.display()
            );
        }
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = std::fs::remove_file(temp_path);
                warn!("Rolled back Parquet temp file: {}", temp_path.display());
            }
        }
        self.temp_path = None;
        self.committed = false;
        Ok(())
    }
}

impl Drop for ParquetSink {
    fn drop(&mut self) {
        // Cleanup temp file if we didn't finish properly
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = std::fs::remove_file(temp_path);
                warn!("Cleaned up orphaned temp file: {}", temp_path.display());
            }
        }
    }
}

/// CSV sink with the same staging lifecycle as the Parquet sink.
pub struct CsvSink {
    final_path: PathBuf,
    writer: Option<arrow::csv::Writer<std::fs::File>>,
    rows_written: u64,
    temp_path: Option<PathBuf>,
    committed: bool,
}

impl CsvSink {
    pub fn new(final_path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&final_path)?;
        Ok(Self {
            final_path,
            writer: None,
            rows_written: 0,
            temp_path: None,
            committed: false,
        })
    }

    fn init(&mut self, _schema: &Schema) -> Result<()> {
        let temp_path = staging_path(&self.final_path)?;
        info!(
            "Initializing CSV sink: {} (temp: {})",
            self.final_path.display(),
            temp_path.display()
        );

        let file = std::fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp CSV file: {}", temp_path.display()))?;

        let writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(file);

        self.writer = Some(writer);
        self.temp_path = Some(temp_path);
        Ok(())
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("CSV sink not initialized"))?;

        writer.write(batch).context("Failed to write batch to CSV")?;

        let rows = batch.num_rows() as u64;
        self.rows_written += rows;
        debug!("Wrote {} rows to CSV (total: {})", rows, self.rows_written);

        Ok(rows)
    }

    fn prepare(&mut self) -> Result<()> {
        // Drop writer to flush
        drop(self.writer.take());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(temp_path) = &self.temp_path {
            std::fs::rename(temp_path, &self.final_path).with_context(|| {
                format!(
                    "Failed to rename {} -> {}",
                    temp_path.display(),
                    self.final_path.display()
                )
            })?;
            info!(
                "Committed CSV sink: {} ({} rows)",
                self.final_path.display(),
                self.rows_written
            );
            self.committed = true;
        }
        self.temp_path = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.committed && self.final_path.exists() {
            let _ = std::fs::remove_file(&self.final_path);
            warn!(
                "Rolled back CSV committed file: {}",
                self.final_path.display()
            );
        }
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = std::fs::remove_file(temp_path);
                warn!("Rolled back CSV temp file: {}", temp_path.display());
            }
        }
        self.temp_path = None;
        self.committed = false;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = std::fs::remove_file(temp_path);
                warn!("Cleaned up orphaned temp file: {}", temp_path.display());
            }
        }
    }
}

/// Sink selected by output file extension.
pub enum Sink {
    Parquet(ParquetSink),
    Csv(Box<CsvSink>),
}

impl Sink {
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "parquet" => Ok(Sink::Parquet(ParquetSink::new(path.to_path_buf())?)),
            "csv" => Ok(Sink::Csv(Box::new(CsvSink::new(path.to_path_buf())?))),
            other => bail!("Unsupported output extension: '{}'", other),
        }
    }

    fn init(&mut self, schema: &Schema) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.init(schema),
            Sink::Csv(sink) => sink.init(schema),
        }
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        match self {
            Sink::Parquet(sink) => sink.write_batch(batch),
            Sink::Csv(sink) => sink.write_batch(batch),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.prepare(),
            Sink::Csv(sink) => sink.prepare(),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.commit(),
            Sink::Csv(sink) => sink.commit(),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.rollback(),
            Sink::Csv(sink) => sink.rollback(),
        }
    }
}

/// Write the full event table in one staged transaction: init, write every
/// batch, flush, then atomically promote. Rolls back on any failure so the
/// previous output survives intact until the new one is complete.
pub fn write_event_table(path: &Path, schema: &Schema, batches: &[RecordBatch]) -> Result<u64> {
    let mut sink = Sink::for_path(path)?;

    let result = (|| {
        sink.init(schema)?;
        let mut rows = 0;
        for batch in batches {
            rows += sink.write_batch(batch)?;
        }
        sink.prepare()?;
        sink.commit()?;
        Ok(rows)
    })();

    if result.is_err() {
        warn!("Event table write failed, rolling back: {}", path.display());
        let _ = sink.rollback();
    }

    result
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn staging_path(final_path: &Path) -> Result<PathBuf> {
    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Output path has no file name: {}", final_path.display()))?;
    let parent = final_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(".{}.tmp", file_name)))
}
