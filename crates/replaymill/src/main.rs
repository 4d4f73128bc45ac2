//! Replaymill launcher.
//!
//! Ingests XES game-telemetry logs into one flat Parquet event table, plus
//! standalone utilities for input discovery and (optionally) the DuckDB
//! warehouse transform.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use replaymill::cli;
use replaymill_xes::chunk::DEFAULT_CHUNK_SIZE;

#[derive(Parser, Debug)]
#[command(name = "replaymill", about = "XES game-telemetry ingestion pipeline")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover XES log files in a directory
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Parse all XES logs and write the flat event table
    Ingest {
        /// Directory containing .xes exports
        #[arg(long, env = "REPLAYMILL_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Output table path (.parquet or .csv)
        #[arg(
            long,
            env = "REPLAYMILL_OUTPUT",
            default_value = "warehouse/events_raw.parquet"
        )]
        output: PathBuf,

        /// Rows per chunk flushed out of the parse buffer
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Suppress the summary line
        #[arg(short, long)]
        quiet: bool,
    },

    /// Rebuild the cleaned DuckDB table from the raw Parquet output
    Transform {
        /// DuckDB database file
        #[arg(long, env = "REPLAYMILL_WAREHOUSE", default_value = "warehouse/aoe.duckdb")]
        warehouse: PathBuf,

        /// Raw event table produced by `ingest`
        #[arg(long, default_value = "warehouse/events_raw.parquet")]
        events: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = replaymill_logging::init_logging("replaymill", cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {err:#}");
    }

    let result = match cli.command {
        Commands::Scan { path, json } => cli::scan::run(cli::scan::ScanArgs { path, json }),
        Commands::Ingest {
            data_dir,
            output,
            chunk_size,
            quiet,
        } => cli::ingest::run(cli::ingest::IngestArgs {
            data_dir,
            output,
            chunk_size,
            quiet,
        }),
        Commands::Transform { warehouse, events } => {
            cli::transform::run(cli::transform::TransformArgs { warehouse, events })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("command failed: {err:#}");
            eprintln!("Error: {err}");
            for cause in err.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
