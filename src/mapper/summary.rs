//! Cycle-stateful summarizers: accumulate across one harvest cycle, emit
//! interval summaries at flush.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::{HarvestError, Result};
use crate::mapper::Mapper;
use crate::record::raw::RawRecord;
use crate::telemetry::attributes::Attributes;
use crate::telemetry::item::{Metric, TelemetryItem};
use crate::telemetry::thread_name::ThreadNameNormalizer;

// ──────────────────── accumulation primitives ────────────────────

/// Running count/sum/min/max over integer samples.
#[derive(Debug, Default, Clone)]
pub struct LongSummarizer {
    count: u64,
    sum: i64,
    min: i64,
    max: i64,
}

impl LongSummarizer {
    pub fn accept(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[allow(clippy::cast_precision_loss)]
    fn into_payload(self) -> (u64, f64, f64, f64) {
        (self.count, self.sum as f64, self.min as f64, self.max as f64)
    }
}

/// Running count/sum/min/max over durations, in milliseconds.
#[derive(Debug, Default, Clone)]
pub struct DurationSummarizer {
    count: u64,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

impl DurationSummarizer {
    pub fn accept(&mut self, duration: Duration) {
        let ms = duration.as_secs_f64() * 1_000.0;
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.sum_ms += ms;
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ──────────────────── jdk.GarbageCollection ────────────────────

/// Aggregates GC pause durations into minor/major interval summaries.
///
/// Collector names outside the known minor/major sets (Shenandoah, Z,
/// sentinels) are ignored.
pub struct GarbageCollectionSummarizer {
    minor: DurationSummarizer,
    major: DurationSummarizer,
    start_ms: Option<i64>,
    minor_end_ms: i64,
    major_end_ms: i64,
}

const MINOR_GC_NAMES: &[&str] = &["DefNew", "G1New", "ParallelScavenge", "ParNew", "PSMarkSweep"];
const MAJOR_GC_NAMES: &[&str] = &[
    "ConcurrentMarkSweep",
    "G1Full",
    "G1Old",
    "ParallelOld",
    "SerialOld",
];

impl GarbageCollectionSummarizer {
    pub const EVENT_NAME: &'static str = "jdk.GarbageCollection";

    #[must_use]
    pub fn new() -> Self {
        Self {
            minor: DurationSummarizer::default(),
            major: DurationSummarizer::default(),
            start_ms: None,
            minor_end_ms: 0,
            major_end_ms: 0,
        }
    }
}

impl Default for GarbageCollectionSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for GarbageCollectionSummarizer {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn cycle_stateful(&self) -> bool {
        true
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let Some(name) = record.str_field("name") else {
            return Ok(Vec::new());
        };
        let duration = record
            .duration()
            .or_else(|| record.duration_field("duration"))
            .unwrap_or(Duration::ZERO);

        self.start_ms.get_or_insert(record.timestamp_ms());
        if MINOR_GC_NAMES.contains(&name) {
            self.minor.accept(duration);
            self.minor_end_ms = record.timestamp_ms();
        } else if MAJOR_GC_NAMES.contains(&name) {
            self.major.accept(duration);
            self.major_end_ms = record.timestamp_ms();
        }
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Vec<TelemetryItem> {
        let start_ms = self.start_ms.take().unwrap_or(0);
        let mut items = Vec::with_capacity(2);

        let minor = std::mem::take(&mut self.minor);
        if !minor.is_empty() {
            items.push(
                Metric::summary(
                    "jfr.GarbageCollection.minorDuration",
                    minor.count,
                    minor.sum_ms,
                    minor.min_ms,
                    minor.max_ms,
                    start_ms,
                    self.minor_end_ms,
                    Attributes::new(),
                )
                .into(),
            );
        }
        let major = std::mem::take(&mut self.major);
        if !major.is_empty() {
            items.push(
                Metric::summary(
                    "jfr.GarbageCollection.majorDuration",
                    major.count,
                    major.sum_ms,
                    major.min_ms,
                    major.max_ms,
                    start_ms,
                    self.major_end_ms,
                    Attributes::new(),
                )
                .into(),
            );
        }
        self.minor_end_ms = 0;
        self.major_end_ms = 0;
        items
    }
}

// ──────────────────── per-thread long summaries ────────────────────

#[derive(Debug, Default)]
struct PerThreadState {
    summarizer: LongSummarizer,
    start_ms: i64,
    end_ms: i64,
}

/// Dispatches one event type's integer field into per-thread summaries.
///
/// Covers TLAB allocation and socket read/write events, which differ only in
/// event type, sampled field, and output metric name. Thread names are
/// normalized before becoming the grouping key, so per-instance thread
/// suffixes collapse into one summary.
pub struct PerThreadSummarizer {
    event_name: &'static str,
    field: &'static str,
    metric_name: &'static str,
    normalizer: Arc<ThreadNameNormalizer>,
    threads: HashMap<String, PerThreadState>,
}

impl PerThreadSummarizer {
    pub const ALLOCATION_EVENT: &'static str = "jdk.ObjectAllocationInNewTLAB";
    pub const SOCKET_READ_EVENT: &'static str = "jdk.SocketRead";
    pub const SOCKET_WRITE_EVENT: &'static str = "jdk.SocketWrite";

    /// TLAB allocation sizes per thread.
    #[must_use]
    pub fn allocation_in_new_tlab(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self {
            event_name: Self::ALLOCATION_EVENT,
            field: "tlabSize",
            metric_name: "jfr.ObjectAllocationInNewTLAB.allocation",
            normalizer,
            threads: HashMap::new(),
        }
    }

    /// Socket bytes read per thread.
    #[must_use]
    pub fn socket_read(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self {
            event_name: Self::SOCKET_READ_EVENT,
            field: "bytesRead",
            metric_name: "jfr.SocketRead.bytesRead",
            normalizer,
            threads: HashMap::new(),
        }
    }

    /// Socket bytes written per thread.
    #[must_use]
    pub fn socket_write(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self {
            event_name: Self::SOCKET_WRITE_EVENT,
            field: "bytesWritten",
            metric_name: "jfr.SocketWrite.bytesWritten",
            normalizer,
            threads: HashMap::new(),
        }
    }
}

impl Mapper for PerThreadSummarizer {
    fn type_id(&self) -> &str {
        self.event_name
    }

    fn cycle_stateful(&self) -> bool {
        true
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let Some(thread) = record.str_field("eventThread") else {
            return Ok(Vec::new());
        };
        let value = record.int(self.field).ok_or_else(|| HarvestError::Mapper {
            type_id: self.event_name.to_string(),
            details: format!("missing field: {}", self.field),
        })?;

        let key = self.normalizer.normalize(thread);
        let state = self.threads.entry(key).or_insert_with(|| PerThreadState {
            start_ms: record.timestamp_ms(),
            ..PerThreadState::default()
        });
        state.summarizer.accept(value);
        state.end_ms = record.timestamp_ms();
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Vec<TelemetryItem> {
        let mut entries: Vec<(String, PerThreadState)> = self.threads.drain().collect();
        // Deterministic flush order keeps batches reproducible.
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .into_iter()
            .map(|(thread, state)| {
                let (count, sum, min, max) = state.summarizer.into_payload();
                Metric::summary(
                    self.metric_name,
                    count,
                    sum,
                    min,
                    max,
                    state.start_ms,
                    state.end_ms,
                    Attributes::new().put("thread.name", thread),
                )
                .into()
            })
            .collect()
    }
}
