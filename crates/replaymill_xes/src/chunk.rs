//! Bounded row batching.

use crate::record::EventRecord;

/// Default rows per chunk, sized so a chunk of wide rows stays comfortably in
/// memory while keeping flush overhead low.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Accumulates normalized rows and drains them in fixed-size chunks, so peak
/// uncommitted memory is O(chunk size) regardless of input size. The buffer is
/// emptied on every drain; rows are neither lost nor duplicated across drains
/// and arrival order is preserved.
#[derive(Debug)]
pub struct ChunkBuffer {
    rows: Vec<EventRecord>,
    target: usize,
}

impl ChunkBuffer {
    pub fn new(target: usize) -> Self {
        Self {
            rows: Vec::new(),
            target: target.max(1),
        }
    }

    /// Add a row; returns a full chunk once the target size is reached.
    pub fn push(&mut self, row: EventRecord) -> Option<Vec<EventRecord>> {
        self.rows.push(row);
        if self.rows.len() >= self.target {
            Some(std::mem::take(&mut self.rows))
        } else {
            None
        }
    }

    /// Drain whatever remains at end of stream.
    pub fn finish(mut self) -> Option<Vec<EventRecord>> {
        if self.rows.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.rows))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}
