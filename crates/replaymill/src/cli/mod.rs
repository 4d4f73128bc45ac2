//! CLI commands for replaymill.
//!
//! `scan` and `ingest` are always available; `transform` needs the
//! `warehouse` feature because it links DuckDB.

pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod scan;

#[cfg(feature = "warehouse")]
pub mod transform;
#[cfg(not(feature = "warehouse"))]
pub mod transform {
    use std::path::PathBuf;

    #[derive(Debug)]
    pub struct TransformArgs {
        pub warehouse: PathBuf,
        pub events: PathBuf,
    }

    pub fn run(_args: TransformArgs) -> anyhow::Result<()> {
        anyhow::bail!("transform requires the `warehouse` feature")
    }
}

pub use error::HelpfulError;
