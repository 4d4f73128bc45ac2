//! Streaming XES log extraction.
//!
//! XES is the IEEE 1849 XML format for process-mining event logs. Game
//! telemetry exports arrive as one `<log>` per file, containing `<trace>`
//! elements (one per match) which contain `<event>` elements (one per player
//! action). This crate turns those files into a flat stream of typed event
//! records without ever holding a whole document in memory:
//!
//! - [`reader::XesReader`] walks the XML start/end tags and emits one
//!   [`record::EventRecord`] per `<event>`, with trace-level attributes merged
//!   in under event precedence and a synthetic `event_id` assigned.
//! - [`normalize::normalize`] coerces the raw timestamp string into a proper
//!   UTC datetime, leaving unparsable values null.
//! - [`chunk::ChunkBuffer`] batches records so peak memory is bounded by the
//!   chunk size rather than the file size.
//! - [`schema::SchemaBuilder`] reconciles the per-event column sets into one
//!   canonical, type-promoted table schema after all files are read.

pub mod chunk;
pub mod normalize;
pub mod reader;
pub mod record;
pub mod schema;
pub mod value;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading an XES file.
///
/// Structural and XML errors are fatal for the containing file. Everything
/// recoverable (missing case id, bad numeric text, bad timestamps) is handled
/// inline by substituting a null value and never surfaces here.
#[derive(Debug, Error)]
pub enum XesError {
    #[error("{source_name}: structural error at byte {position}: {message}")]
    Structure {
        source_name: String,
        position: u64,
        message: String,
    },

    #[error("{source_name}: malformed XML at byte {position}")]
    Xml {
        source_name: String,
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("failed to open {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, XesError>;
