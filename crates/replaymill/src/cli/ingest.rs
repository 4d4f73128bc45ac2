//! Ingest command - run the XES extraction pipeline end to end.

use std::path::PathBuf;

use crate::cli::output::format_number;
use crate::cli::pipeline::{self, PipelineConfig};

/// Arguments for the ingest command
#[derive(Debug)]
pub struct IngestArgs {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub chunk_size: usize,
    pub quiet: bool,
}

/// Execute the ingest command
pub fn run(args: IngestArgs) -> anyhow::Result<()> {
    let config = PipelineConfig {
        data_dir: args.data_dir,
        output: args.output.clone(),
        chunk_size: args.chunk_size,
    };

    let report = pipeline::run(&config)?;

    if !args.quiet {
        if report.events == 0 {
            println!(
                "Parsed {} file(s); no events found, nothing written",
                report.files
            );
        } else {
            println!(
                "Parsed {} file(s) with {} events -> {}",
                report.files,
                format_number(report.events),
                args.output.display()
            );
        }
    }

    Ok(())
}
