//! Scan command - discover XES logs in a directory.
//!
//! Standalone utility: no pipeline run, just what would be ingested.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::cli::error::HelpfulError;
use crate::cli::output::format_size;
use crate::cli::pipeline::discover_input_files;

/// Arguments for the scan command
#[derive(Debug)]
pub struct ScanArgs {
    pub path: PathBuf,
    pub json: bool,
}

/// One discovered input log
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredLog {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Execute the scan command
pub fn run(args: ScanArgs) -> anyhow::Result<()> {
    let files = discover_input_files(&args.path)?;

    let mut logs = Vec::with_capacity(files.len());
    let mut total_size = 0u64;
    for path in files {
        let metadata = fs::metadata(&path)?;
        total_size += metadata.len();
        logs.push(DiscoveredLog {
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            path,
        });
    }

    if logs.is_empty() {
        return Err(HelpfulError::no_input_files(&args.path).into());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    for log in &logs {
        let modified = log
            .modified
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10}  {}  {}",
            format_size(log.size),
            modified,
            log.path.display()
        );
    }
    println!(
        "\n{} file(s), {} total",
        logs.len(),
        format_size(total_size)
    );

    Ok(())
}
