//! Record source contract: a non-blocking, restartable-per-cycle drain over
//! the recording session.

#![allow(missing_docs)]

use std::collections::VecDeque;

use crate::core::errors::Result;
use crate::record::raw::RawRecord;

/// One drain's worth of decoded records.
///
/// `decode_errors` counts malformed records the source skipped; they are
/// never surfaced as per-record errors to the scheduler.
#[derive(Debug, Default)]
pub struct DrainChunk {
    pub records: Vec<RawRecord>,
    pub decode_errors: u64,
}

impl DrainChunk {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.decode_errors == 0
    }
}

/// Supplier of decoded records for the harvest loop.
///
/// `drain` must return promptly: when nothing new is available it returns an
/// empty chunk rather than blocking the scheduler. A `drain` error that is
/// fatal for the source (`HarvestError::is_fatal_for_source`) stops the
/// harvest loop; any other failure skips the cycle.
pub trait RecordSource: Send {
    fn drain(&mut self) -> Result<DrainChunk>;

    /// Release the underlying recording session.
    fn close(&mut self) {}
}

/// Scripted in-memory source: each `drain` pops the next queued chunk.
///
/// Used by tests and by `jfrh once` replay mode.
#[derive(Debug, Default)]
pub struct ReplaySource {
    chunks: VecDeque<DrainChunk>,
    closed: bool,
}

impl ReplaySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, records: Vec<RawRecord>) {
        self.chunks.push_back(DrainChunk {
            records,
            decode_errors: 0,
        });
    }

    pub fn push_chunk_with_errors(&mut self, records: Vec<RawRecord>, decode_errors: u64) {
        self.chunks.push_back(DrainChunk {
            records,
            decode_errors,
        });
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn remaining_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl RecordSource for ReplaySource {
    fn drain(&mut self) -> Result<DrainChunk> {
        Ok(self.chunks.pop_front().unwrap_or_default())
    }

    fn close(&mut self) {
        self.closed = true;
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_drains_empty_chunks() {
        let mut source = ReplaySource::new();
        let chunk = source.drain().unwrap();
        assert!(chunk.is_empty());
    }

    #[test]
    fn chunks_pop_in_order() {
        let mut source = ReplaySource::new();
        source.push_chunk(vec![RawRecord::new("jdk.CPULoad", 1)]);
        source.push_chunk(vec![RawRecord::new("jdk.CPULoad", 2)]);

        assert_eq!(source.drain().unwrap().records[0].timestamp_ms(), 1);
        assert_eq!(source.drain().unwrap().records[0].timestamp_ms(), 2);
        assert!(source.drain().unwrap().is_empty());
    }

    #[test]
    fn close_discards_pending_chunks() {
        let mut source = ReplaySource::new();
        source.push_chunk(vec![RawRecord::new("jdk.CPULoad", 1)]);
        source.close();
        assert!(source.is_closed());
        assert_eq!(source.remaining_chunks(), 0);
    }

    #[test]
    fn decode_errors_travel_with_the_chunk() {
        let mut source = ReplaySource::new();
        source.push_chunk_with_errors(Vec::new(), 3);
        let chunk = source.drain().unwrap();
        assert!(chunk.records.is_empty());
        assert_eq!(chunk.decode_errors, 3);
    }
}
