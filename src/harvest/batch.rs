//! Finalized per-cycle batches: immutable, ordered, sequence-stamped.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::telemetry::item::TelemetryItem;

/// One harvest cycle's telemetry, finalized and ready for delivery.
///
/// Immutable after construction: the aggregator hands it to the queue and
/// nothing downstream adds or removes items. `split_halves` produces new
/// batches rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    sequence: u64,
    cycle_start_ms: i64,
    cycle_end_ms: i64,
    items: Vec<TelemetryItem>,
}

impl Batch {
    #[must_use]
    pub fn new(
        sequence: u64,
        cycle_start_ms: i64,
        cycle_end_ms: i64,
        items: Vec<TelemetryItem>,
    ) -> Self {
        Self {
            sequence,
            cycle_start_ms,
            cycle_end_ms,
            items,
        }
    }

    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub const fn cycle_start_ms(&self) -> i64 {
        self.cycle_start_ms
    }

    #[must_use]
    pub const fn cycle_end_ms(&self) -> i64 {
        self.cycle_end_ms
    }

    #[must_use]
    pub fn items(&self) -> &[TelemetryItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into two half-sized batches for payload-too-large recovery.
    ///
    /// Both halves keep the original sequence and time range; item order is
    /// preserved across the pair.
    #[must_use]
    pub fn split_halves(self) -> (Self, Self) {
        let mid = self.items.len() / 2;
        let mut front = self.items;
        let back = front.split_off(mid);
        (
            Self {
                sequence: self.sequence,
                cycle_start_ms: self.cycle_start_ms,
                cycle_end_ms: self.cycle_end_ms,
                items: front,
            },
            Self {
                sequence: self.sequence,
                cycle_start_ms: self.cycle_start_ms,
                cycle_end_ms: self.cycle_end_ms,
                items: back,
            },
        )
    }
}
