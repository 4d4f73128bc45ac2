//! Replaymill: XES game-telemetry ingestion.
//!
//! The binary lives in `main.rs`; everything it dispatches to is here so the
//! pipeline can be exercised from integration tests.

pub mod cli;
