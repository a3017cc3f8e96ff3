//! Operational counters for the harvest→deliver pipeline.
//!
//! Counters are observed externally (state file, activity log, shutdown
//! summary); they are never re-emitted as telemetry items.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide pipeline counters, shared via `Arc`.
///
/// All increments use `Ordering::Relaxed`: readers only ever need a
/// point-in-time snapshot, never ordering against other memory.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    decode_errors: AtomicU64,
    unmapped_events: AtomicU64,
    mapper_errors: AtomicU64,
    dropped_batches: AtomicU64,
    retried_sends: AtomicU64,
    permanent_failures: AtomicU64,
    successful_batches: AtomicU64,
    cycles_completed: AtomicU64,
}

impl PipelineCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_decode_errors(&self, n: u64) {
        self.decode_errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_unmapped_event(&self) {
        self.unmapped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mapper_error(&self) {
        self.mapper_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_batch(&self) {
        self.dropped_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried_send(&self) {
        self.retried_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_permanent_failure(&self) {
        self.permanent_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_successful_batch(&self) {
        self.successful_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn unmapped_events(&self) -> u64 {
        self.unmapped_events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_batches(&self) -> u64 {
        self.dropped_batches.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unmapped_events: self.unmapped_events.load(Ordering::Relaxed),
            mapper_errors: self.mapper_errors.load(Ordering::Relaxed),
            dropped_batches: self.dropped_batches.load(Ordering::Relaxed),
            retried_sends: self.retried_sends.load(Ordering::Relaxed),
            permanent_failures: self.permanent_failures.load(Ordering::Relaxed),
            successful_batches: self.successful_batches.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of all pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub decode_errors: u64,
    pub unmapped_events: u64,
    pub mapper_errors: u64,
    pub dropped_batches: u64,
    pub retried_sends: u64,
    pub permanent_failures: u64,
    pub successful_batches: u64,
    pub cycles_completed: u64,
}
