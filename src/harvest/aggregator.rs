//! Cycle aggregator: routes records through the registry and folds emitted
//! items into one batch per harvest cycle.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use crate::harvest::batch::Batch;
use crate::harvest::counters::PipelineCounters;
use crate::mapper::registry::MapperRegistry;
use crate::record::raw::RawRecord;
use crate::telemetry::item::{LogEvent, Metric, MetricIdentity, Span, TelemetryItem};

/// Accumulates one cycle's telemetry, merging same-identity metrics.
///
/// Mapping happens sequentially on the scheduler's thread, so nothing in
/// here needs synchronization. All cycle state clears at finalize; a second
/// finalize without intervening offers yields an empty batch.
pub struct Aggregator {
    registry: MapperRegistry,
    counters: Arc<PipelineCounters>,
    metric_index: HashMap<MetricIdentity, usize>,
    metrics: Vec<Metric>,
    spans: Vec<Span>,
    events: Vec<LogEvent>,
    /// Type ids of cycle-stateful mappers that saw a record this cycle, in
    /// first-touch order. Each is flushed exactly once at finalize.
    touched_stateful: Vec<String>,
    first_record_ms: Option<i64>,
    last_record_ms: Option<i64>,
}

impl Aggregator {
    #[must_use]
    pub fn new(registry: MapperRegistry, counters: Arc<PipelineCounters>) -> Self {
        Self {
            registry,
            counters,
            metric_index: HashMap::new(),
            metrics: Vec::new(),
            spans: Vec::new(),
            events: Vec::new(),
            touched_stateful: Vec::new(),
            first_record_ms: None,
            last_record_ms: None,
        }
    }

    /// Route one record through its mapper and fold the emitted items.
    ///
    /// Never fails: unknown types count as unmapped, mapper errors count and
    /// leave the cycle running.
    pub fn offer(&mut self, record: &RawRecord) {
        self.first_record_ms.get_or_insert(record.timestamp_ms());
        self.last_record_ms = Some(record.timestamp_ms());

        let (stateful, type_id, outcome) = {
            let mapper = self.registry.resolve(record.type_id());
            (
                mapper.cycle_stateful(),
                mapper.type_id().to_string(),
                mapper.map(record),
            )
        };
        if stateful && !self.touched_stateful.contains(&type_id) {
            self.touched_stateful.push(type_id);
        }

        match outcome {
            Ok(items) => {
                for item in items {
                    self.fold_item(item);
                }
            }
            Err(_) => self.counters.record_mapper_error(),
        }
    }

    /// Flush stateful mappers, stamp and return the cycle's batch, and clear
    /// all cycle-local state.
    pub fn finalize_cycle(&mut self, sequence: u64, now_ms: i64) -> Batch {
        let touched = std::mem::take(&mut self.touched_stateful);
        let mut flushed = Vec::new();
        for type_id in touched {
            if let Some(mapper) = self.registry.get_mut(&type_id) {
                flushed.extend(mapper.flush());
            }
        }
        for item in flushed {
            self.fold_item(item);
        }

        let cycle_start_ms = self.first_record_ms.take().unwrap_or(now_ms);
        let cycle_end_ms = self.last_record_ms.take().unwrap_or(now_ms).max(now_ms);

        self.metric_index.clear();
        let mut items: Vec<TelemetryItem> = Vec::with_capacity(
            self.metrics.len() + self.spans.len() + self.events.len(),
        );
        items.extend(self.metrics.drain(..).map(TelemetryItem::Metric));
        items.extend(self.spans.drain(..).map(TelemetryItem::Span));
        items.extend(self.events.drain(..).map(TelemetryItem::LogEvent));

        Batch::new(sequence, cycle_start_ms, cycle_end_ms, items)
    }

    #[must_use]
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    fn fold_item(&mut self, item: TelemetryItem) {
        match item {
            TelemetryItem::Metric(metric) => {
                let identity = metric.identity();
                if let Some(&index) = self.metric_index.get(&identity) {
                    self.metrics[index].merge(&metric);
                } else {
                    self.metric_index.insert(identity, self.metrics.len());
                    self.metrics.push(metric);
                }
            }
            TelemetryItem::Span(span) => self.spans.push(span),
            TelemetryItem::LogEvent(event) => self.events.push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::Result;
    use crate::mapper::Mapper;
    use crate::mapper::registry::default_registry;
    use crate::telemetry::attributes::Attributes;
    use crate::telemetry::item::MetricPayload;
    use crate::telemetry::thread_name::ThreadNameNormalizer;

    /// Maps every "test.A" record to a count metric `a.count` = 1.
    struct CountPerRecord;

    impl Mapper for CountPerRecord {
        fn type_id(&self) -> &str {
            "test.A"
        }

        fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
            Ok(vec![
                Metric::count("a.count", 1.0, record.timestamp_ms(), Attributes::new()).into(),
            ])
        }
    }

    fn counters() -> Arc<PipelineCounters> {
        Arc::new(PipelineCounters::new())
    }

    fn test_aggregator(counters: &Arc<PipelineCounters>) -> Aggregator {
        let registry = MapperRegistry::builder(Arc::clone(counters))
            .register(Box::new(CountPerRecord))
            .build();
        Aggregator::new(registry, Arc::clone(counters))
    }

    #[test]
    fn same_identity_counts_merge_by_summation() {
        let counters = counters();
        let mut agg = test_aggregator(&counters);
        agg.offer(&RawRecord::new("test.A", 100));
        agg.offer(&RawRecord::new("test.A", 200));

        let batch = agg.finalize_cycle(1, 1_000);
        assert_eq!(batch.len(), 1);
        let TelemetryItem::Metric(metric) = &batch.items()[0] else {
            panic!("expected metric");
        };
        assert_eq!(metric.name, "a.count");
        assert_eq!(metric.payload, MetricPayload::Count(2.0));
    }

    #[test]
    fn finalize_twice_without_offers_is_empty() {
        let counters = counters();
        let mut agg = test_aggregator(&counters);
        agg.offer(&RawRecord::new("test.A", 100));

        let first = agg.finalize_cycle(1, 1_000);
        assert_eq!(first.len(), 1);

        let second = agg.finalize_cycle(2, 2_000);
        assert!(second.is_empty());
        assert_eq!(second.sequence(), 2);
    }

    #[test]
    fn unknown_types_never_raise_and_are_counted_exactly() {
        let counters = counters();
        let normalizer = Arc::new(ThreadNameNormalizer::new());
        let registry = default_registry(Arc::clone(&counters), normalizer, &[]);
        let mut agg = Aggregator::new(registry, Arc::clone(&counters));

        for i in 0..5 {
            agg.offer(&RawRecord::new("jdk.TotallyUnknown", i));
        }
        let batch = agg.finalize_cycle(1, 1_000);
        assert!(batch.is_empty());
        assert_eq!(counters.unmapped_events(), 5);
    }

    #[test]
    fn stateful_mappers_flush_once_into_the_batch() {
        let counters = counters();
        let normalizer = Arc::new(ThreadNameNormalizer::new());
        let registry = default_registry(Arc::clone(&counters), normalizer, &[]);
        let mut agg = Aggregator::new(registry, Arc::clone(&counters));

        use crate::record::raw::FieldValue;
        for ts in [100, 200] {
            agg.offer(
                &RawRecord::new("jdk.ObjectAllocationInNewTLAB", ts)
                    .with_field("eventThread", FieldValue::Str("main".into()))
                    .with_field("tlabSize", FieldValue::Int(1_024)),
            );
        }

        let batch = agg.finalize_cycle(1, 1_000);
        assert_eq!(batch.len(), 1);
        let TelemetryItem::Metric(metric) = &batch.items()[0] else {
            panic!("expected metric");
        };
        assert_eq!(metric.name, "jfr.ObjectAllocationInNewTLAB.allocation");
        assert_eq!(
            metric.payload,
            MetricPayload::Summary {
                count: 2,
                sum: 2_048.0,
                min: 1_024.0,
                max: 1_024.0,
            }
        );

        // Cycle state cleared: nothing re-flushes.
        assert!(agg.finalize_cycle(2, 2_000).is_empty());
    }

    #[test]
    fn batch_time_range_covers_offered_records() {
        let counters = counters();
        let mut agg = test_aggregator(&counters);
        agg.offer(&RawRecord::new("test.A", 400));
        agg.offer(&RawRecord::new("test.A", 700));

        let batch = agg.finalize_cycle(1, 1_000);
        assert_eq!(batch.cycle_start_ms(), 400);
        assert_eq!(batch.cycle_end_ms(), 1_000);
    }

    #[test]
    fn mapper_error_counts_and_cycle_continues() {
        struct AlwaysFails;
        impl Mapper for AlwaysFails {
            fn type_id(&self) -> &str {
                "test.Broken"
            }
            fn map(&mut self, _record: &RawRecord) -> Result<Vec<TelemetryItem>> {
                Err(crate::core::errors::HarvestError::Mapper {
                    type_id: "test.Broken".into(),
                    details: "boom".into(),
                })
            }
        }

        let counters = counters();
        let registry = MapperRegistry::builder(Arc::clone(&counters))
            .register(Box::new(AlwaysFails))
            .register(Box::new(CountPerRecord))
            .build();
        let mut agg = Aggregator::new(registry, Arc::clone(&counters));

        agg.offer(&RawRecord::new("test.Broken", 100));
        agg.offer(&RawRecord::new("test.A", 200));

        let batch = agg.finalize_cycle(1, 1_000);
        assert_eq!(batch.len(), 1);
        assert_eq!(counters.snapshot().mapper_errors, 1);
    }
}
