//! Stateless metric mappers: one record in, gauge metrics out.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::core::errors::{HarvestError, Result};
use crate::mapper::Mapper;
use crate::record::raw::{RawRecord, nested_int};
use crate::telemetry::attributes::Attributes;
use crate::telemetry::item::{Metric, TelemetryItem};
use crate::telemetry::thread_name::ThreadNameNormalizer;

fn missing_field(record: &RawRecord, field: &'static str) -> HarvestError {
    HarvestError::Mapper {
        type_id: record.type_id().to_string(),
        details: format!("missing field: {field}"),
    }
}

// ──────────────────── jdk.GarbageCollection ────────────────────

/// Longest-pause gauge per collection, tagged with collector name and cause.
#[derive(Debug, Default)]
pub struct GarbageCollectionMapper;

impl GarbageCollectionMapper {
    pub const EVENT_NAME: &'static str = "jdk.GarbageCollection";
}

impl Mapper for GarbageCollectionMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let longest_pause = record
            .float("longestPause")
            .ok_or_else(|| missing_field(record, "longestPause"))?;

        let mut attr = Attributes::new();
        if let Some(name) = record.str_field("name") {
            attr.insert("name", name);
        }
        if let Some(cause) = record.str_field("cause") {
            attr.insert("cause", cause);
        }

        Ok(vec![
            Metric::gauge(
                "jfr.GarbageCollection.longestPause",
                longest_pause,
                record.timestamp_ms(),
                attr,
            )
            .into(),
        ])
    }
}

// ──────────────────── jdk.ThreadCPULoad ────────────────────

/// Per-thread user/system CPU gauges, keyed by normalized thread name.
pub struct CpuThreadLoadMapper {
    normalizer: Arc<ThreadNameNormalizer>,
}

impl CpuThreadLoadMapper {
    pub const EVENT_NAME: &'static str = "jdk.ThreadCPULoad";

    #[must_use]
    pub fn new(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self { normalizer }
    }
}

impl Mapper for CpuThreadLoadMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        // Events without a resolvable thread name are not an error; the JVM
        // emits them for threads that died before the dump.
        let Some(thread_name) = record.str_field("eventThread") else {
            return Ok(Vec::new());
        };
        let user = record.float("user").ok_or_else(|| missing_field(record, "user"))?;
        let system = record
            .float("system")
            .ok_or_else(|| missing_field(record, "system"))?;

        let attr = Attributes::new().put("thread.name", self.normalizer.normalize(thread_name));
        let ts = record.timestamp_ms();
        Ok(vec![
            Metric::gauge("jfr.ThreadCPULoad.user", user, ts, attr.clone()).into(),
            Metric::gauge("jfr.ThreadCPULoad.system", system, ts, attr).into(),
        ])
    }
}

// ──────────────────── jdk.CPULoad ────────────────────

/// Whole-JVM and machine CPU gauges.
#[derive(Debug, Default)]
pub struct OverallCpuLoadMapper;

impl OverallCpuLoadMapper {
    pub const EVENT_NAME: &'static str = "jdk.CPULoad";
}

impl Mapper for OverallCpuLoadMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let jvm_user = record
            .float("jvmUser")
            .ok_or_else(|| missing_field(record, "jvmUser"))?;
        let jvm_system = record
            .float("jvmSystem")
            .ok_or_else(|| missing_field(record, "jvmSystem"))?;
        let machine_total = record
            .float("machineTotal")
            .ok_or_else(|| missing_field(record, "machineTotal"))?;

        let ts = record.timestamp_ms();
        let attr = Attributes::new();
        Ok(vec![
            Metric::gauge("jfr.CPULoad.jvmUser", jvm_user, ts, attr.clone()).into(),
            Metric::gauge("jfr.CPULoad.jvmSystem", jvm_system, ts, attr.clone()).into(),
            Metric::gauge("jfr.CPULoad.machineTotal", machine_total, ts, attr).into(),
        ])
    }
}

// ──────────────────── jdk.GCHeapSummary ────────────────────

/// Heap usage gauges; committed/reserved sizes when the heap-space
/// sub-object is present.
#[derive(Debug, Default)]
pub struct GcHeapSummaryMapper;

impl GcHeapSummaryMapper {
    pub const EVENT_NAME: &'static str = "jdk.GCHeapSummary";
}

impl Mapper for GcHeapSummaryMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    #[allow(clippy::cast_precision_loss)]
    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let heap_used = record
            .int("heapUsed")
            .ok_or_else(|| missing_field(record, "heapUsed"))?;
        let ts = record.timestamp_ms();

        let mut attr = Attributes::new();
        let mut items: Vec<TelemetryItem> = Vec::with_capacity(3);
        if let Some(heap_space) = record.nested("heapSpace") {
            if let Some(when) = record.str_field("when") {
                attr.insert("when", when);
            }
            if let Some(start) = nested_int(heap_space, "start") {
                attr.insert("heapStart", start);
            }
            if let Some(committed_end) = nested_int(heap_space, "committedEnd") {
                attr.insert("committedEnd", committed_end);
            }
            if let Some(reserved_end) = nested_int(heap_space, "reservedEnd") {
                attr.insert("reservedEnd", reserved_end);
            }
            if let Some(committed) = nested_int(heap_space, "committedSize") {
                items.push(
                    Metric::gauge(
                        "jfr.GCHeapSummary.heapCommittedSize",
                        committed as f64,
                        ts,
                        attr.clone(),
                    )
                    .into(),
                );
            }
            if let Some(reserved) = nested_int(heap_space, "reservedSize") {
                items.push(
                    Metric::gauge("jfr.GCHeapSummary.reservedSize", reserved as f64, ts, attr.clone())
                        .into(),
                );
            }
        }
        items.push(Metric::gauge("jfr.GCHeapSummary.heapUsed", heap_used as f64, ts, attr).into());
        Ok(items)
    }
}

// ──────────────────── jdk.ThreadContextSwitchRate ────────────────────

/// OS context-switch rate gauge.
#[derive(Debug, Default)]
pub struct ContextSwitchRateMapper;

impl ContextSwitchRateMapper {
    pub const EVENT_NAME: &'static str = "jdk.ThreadContextSwitchRate";
}

impl Mapper for ContextSwitchRateMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let rate = record
            .float("switchRate")
            .ok_or_else(|| missing_field(record, "switchRate"))?;
        Ok(vec![
            Metric::gauge(
                "jfr.ThreadContextSwitchRate",
                rate,
                record.timestamp_ms(),
                Attributes::new(),
            )
            .into(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::raw::FieldValue;
    use crate::telemetry::item::MetricPayload;

    fn unwrap_metric(item: &TelemetryItem) -> &Metric {
        match item {
            TelemetryItem::Metric(m) => m,
            other => panic!("expected metric, got {other:?}"),
        }
    }

    #[test]
    fn gc_mapper_emits_longest_pause_gauge() {
        let record = RawRecord::new("jdk.GarbageCollection", 1_000)
            .with_field("longestPause", FieldValue::Float(12.5))
            .with_field("name", FieldValue::Str("G1New".into()))
            .with_field("cause", FieldValue::Str("Allocation Failure".into()));

        let items = GarbageCollectionMapper.map(&record).unwrap();
        assert_eq!(items.len(), 1);
        let metric = unwrap_metric(&items[0]);
        assert_eq!(metric.name, "jfr.GarbageCollection.longestPause");
        assert_eq!(metric.payload, MetricPayload::Gauge(12.5));
        assert!(metric.attributes.get("name").is_some());
        assert!(metric.attributes.get("cause").is_some());
    }

    #[test]
    fn gc_mapper_missing_pause_is_mapper_error() {
        let record = RawRecord::new("jdk.GarbageCollection", 1_000);
        let err = GarbageCollectionMapper.map(&record).unwrap_err();
        assert_eq!(err.code(), "JFRH-2101");
    }

    #[test]
    fn thread_cpu_mapper_normalizes_thread_name() {
        let mut mapper = CpuThreadLoadMapper::new(Arc::new(ThreadNameNormalizer::new()));
        let record = RawRecord::new("jdk.ThreadCPULoad", 1_000)
            .with_field("eventThread", FieldValue::Str("pool-2-thread-7".into()))
            .with_field("user", FieldValue::Float(0.25))
            .with_field("system", FieldValue::Float(0.05));

        let items = mapper.map(&record).unwrap();
        assert_eq!(items.len(), 2);
        let user = unwrap_metric(&items[0]);
        assert_eq!(
            user.attributes.get("thread.name"),
            Some(&crate::telemetry::attributes::AttrValue::Str(
                "pool#thread#".into()
            ))
        );
    }

    #[test]
    fn thread_cpu_mapper_without_thread_name_emits_nothing() {
        let mut mapper = CpuThreadLoadMapper::new(Arc::new(ThreadNameNormalizer::new()));
        let record = RawRecord::new("jdk.ThreadCPULoad", 1_000)
            .with_field("user", FieldValue::Float(0.25))
            .with_field("system", FieldValue::Float(0.05));
        assert!(mapper.map(&record).unwrap().is_empty());
    }

    #[test]
    fn overall_cpu_mapper_emits_three_gauges() {
        let record = RawRecord::new("jdk.CPULoad", 1_000)
            .with_field("jvmUser", FieldValue::Float(0.10))
            .with_field("jvmSystem", FieldValue::Float(0.02))
            .with_field("machineTotal", FieldValue::Float(0.55));
        let items = OverallCpuLoadMapper.map(&record).unwrap();
        let names: Vec<&str> = items
            .iter()
            .map(|i| unwrap_metric(i).name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "jfr.CPULoad.jvmUser",
                "jfr.CPULoad.jvmSystem",
                "jfr.CPULoad.machineTotal"
            ]
        );
    }

    #[test]
    fn heap_summary_without_heap_space_emits_used_only() {
        let record =
            RawRecord::new("jdk.GCHeapSummary", 1_000).with_field("heapUsed", FieldValue::Int(42));
        let items = GcHeapSummaryMapper.map(&record).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(unwrap_metric(&items[0]).name, "jfr.GCHeapSummary.heapUsed");
    }

    #[test]
    fn heap_summary_with_heap_space_emits_sizes() {
        let record = RawRecord::new("jdk.GCHeapSummary", 1_000)
            .with_field("heapUsed", FieldValue::Int(42))
            .with_field("when", FieldValue::Str("After GC".into()))
            .with_field(
                "heapSpace",
                FieldValue::Nested(vec![
                    ("start".into(), FieldValue::Int(0)),
                    ("committedSize".into(), FieldValue::Int(512)),
                    ("committedEnd".into(), FieldValue::Int(512)),
                    ("reservedSize".into(), FieldValue::Int(1024)),
                    ("reservedEnd".into(), FieldValue::Int(1024)),
                ]),
            );
        let items = GcHeapSummaryMapper.map(&record).unwrap();
        assert_eq!(items.len(), 3);
        let metric = unwrap_metric(&items[0]);
        assert_eq!(metric.name, "jfr.GCHeapSummary.heapCommittedSize");
        assert!(metric.attributes.get("when").is_some());
    }

    #[test]
    fn context_switch_rate_gauge() {
        let record = RawRecord::new("jdk.ThreadContextSwitchRate", 9)
            .with_field("switchRate", FieldValue::Float(1_234.0));
        let items = ContextSwitchRateMapper.map(&record).unwrap();
        assert_eq!(
            unwrap_metric(&items[0]).payload,
            MetricPayload::Gauge(1_234.0)
        );
    }
}
