//! Mapper registry: closed at startup, O(1) dispatch by event type id.
//!
//! Unknown event types resolve to a counting no-op mapper so the harvest
//! loop never branches on "unsupported"; it just maps to nothing and the
//! unmapped counter moves.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::Result;
use crate::harvest::counters::PipelineCounters;
use crate::mapper::Mapper;
use crate::mapper::events::{JitCompilationMapper, JvmInformationMapper, MonitorWaitMapper};
use crate::mapper::metrics::{
    ContextSwitchRateMapper, CpuThreadLoadMapper, GarbageCollectionMapper, GcHeapSummaryMapper,
    OverallCpuLoadMapper,
};
use crate::mapper::summary::{GarbageCollectionSummarizer, PerThreadSummarizer};
use crate::record::raw::RawRecord;
use crate::telemetry::item::TelemetryItem;
use crate::telemetry::thread_name::ThreadNameNormalizer;

// ──────────────────── no-op mapper ────────────────────

/// Terminal mapper for unknown event types: counts and emits nothing.
pub struct NoOpMapper {
    counters: Arc<PipelineCounters>,
}

impl NoOpMapper {
    #[must_use]
    pub fn new(counters: Arc<PipelineCounters>) -> Self {
        Self { counters }
    }
}

impl Mapper for NoOpMapper {
    fn type_id(&self) -> &str {
        "<unmapped>"
    }

    fn map(&mut self, _record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        self.counters.record_unmapped_event();
        Ok(Vec::new())
    }
}

// ──────────────────── fan-out mapper ────────────────────

/// Routes one event type to several mappers (e.g. a per-event gauge plus a
/// cycle summarizer for jdk.GarbageCollection).
///
/// A failing child is counted as a mapper error without suppressing its
/// siblings' output.
pub struct FanoutMapper {
    type_id: String,
    children: Vec<Box<dyn Mapper>>,
    counters: Arc<PipelineCounters>,
}

impl FanoutMapper {
    #[must_use]
    pub fn new(
        type_id: String,
        children: Vec<Box<dyn Mapper>>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            type_id,
            children,
            counters,
        }
    }
}

impl Mapper for FanoutMapper {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn cycle_stateful(&self) -> bool {
        self.children.iter().any(|c| c.cycle_stateful())
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let mut items = Vec::new();
        for child in &mut self.children {
            match child.map(record) {
                Ok(mut emitted) => items.append(&mut emitted),
                Err(_) => self.counters.record_mapper_error(),
            }
        }
        Ok(items)
    }

    fn flush(&mut self) -> Vec<TelemetryItem> {
        self.children.iter_mut().flat_map(|c| c.flush()).collect()
    }
}

// ──────────────────── registry ────────────────────

/// Fixed mapping from event type id to mapper, built once at startup.
pub struct MapperRegistry {
    mappers: Vec<Box<dyn Mapper>>,
    by_type: HashMap<String, usize>,
    no_op: NoOpMapper,
}

impl MapperRegistry {
    #[must_use]
    pub fn builder(counters: Arc<PipelineCounters>) -> MapperRegistryBuilder {
        MapperRegistryBuilder {
            counters,
            pending: Vec::new(),
        }
    }

    /// Resolve the mapper for an event type. Unknown types get the counting
    /// no-op mapper; this never fails.
    pub fn resolve(&mut self, type_id: &str) -> &mut dyn Mapper {
        match self.by_type.get(type_id) {
            Some(&index) => self.mappers[index].as_mut(),
            None => &mut self.no_op,
        }
    }

    /// Look up a registered mapper without the no-op fallback.
    pub fn get_mut(&mut self, type_id: &str) -> Option<&mut dyn Mapper> {
        match self.by_type.get(type_id) {
            Some(&index) => Some(self.mappers[index].as_mut()),
            None => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Registered type ids, in registration order.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.mappers.iter().map(|m| m.type_id())
    }
}

/// Accumulates mappers, then closes the registry.
pub struct MapperRegistryBuilder {
    counters: Arc<PipelineCounters>,
    pending: Vec<Box<dyn Mapper>>,
}

impl MapperRegistryBuilder {
    #[must_use]
    pub fn register(mut self, mapper: Box<dyn Mapper>) -> Self {
        self.pending.push(mapper);
        self
    }

    /// Close registration. Multiple mappers for one type id are wrapped in a
    /// [`FanoutMapper`].
    #[must_use]
    pub fn build(self) -> MapperRegistry {
        // Group by type id, preserving first-registration order.
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<Box<dyn Mapper>>> = HashMap::new();
        for mapper in self.pending {
            let type_id = mapper.type_id().to_string();
            if !grouped.contains_key(&type_id) {
                order.push(type_id.clone());
            }
            grouped.entry(type_id).or_default().push(mapper);
        }

        let mut mappers: Vec<Box<dyn Mapper>> = Vec::with_capacity(order.len());
        let mut by_type = HashMap::with_capacity(order.len());
        for type_id in order {
            let mut group = grouped.remove(&type_id).unwrap_or_default();
            let mapper = if group.len() == 1 {
                group.remove(0)
            } else {
                Box::new(FanoutMapper::new(
                    type_id.clone(),
                    group,
                    Arc::clone(&self.counters),
                ))
            };
            by_type.insert(type_id, mappers.len());
            mappers.push(mapper);
        }

        MapperRegistry {
            mappers,
            by_type,
            no_op: NoOpMapper::new(self.counters),
        }
    }
}

/// Build the full built-in mapper set, minus disabled event types.
#[must_use]
pub fn default_registry(
    counters: Arc<PipelineCounters>,
    normalizer: Arc<ThreadNameNormalizer>,
    disabled: &[String],
) -> MapperRegistry {
    let all: Vec<Box<dyn Mapper>> = vec![
        Box::new(GarbageCollectionMapper),
        Box::new(GarbageCollectionSummarizer::new()),
        Box::new(GcHeapSummaryMapper),
        Box::new(OverallCpuLoadMapper),
        Box::new(ContextSwitchRateMapper),
        Box::new(CpuThreadLoadMapper::new(Arc::clone(&normalizer))),
        Box::new(MonitorWaitMapper::new(Arc::clone(&normalizer))),
        Box::new(JitCompilationMapper::new(Arc::clone(&normalizer))),
        Box::new(JvmInformationMapper),
        Box::new(PerThreadSummarizer::allocation_in_new_tlab(Arc::clone(
            &normalizer,
        ))),
        Box::new(PerThreadSummarizer::socket_read(Arc::clone(&normalizer))),
        Box::new(PerThreadSummarizer::socket_write(normalizer)),
    ];

    let mut builder = MapperRegistry::builder(counters);
    for mapper in all {
        if disabled.iter().any(|d| d == mapper.type_id()) {
            continue;
        }
        builder = builder.register(mapper);
    }
    builder.build()
}
