//! Event-type mappers: convert one decoded record into zero or more
//! telemetry items.
//!
//! Two shapes exist. Stateless mappers are pure per-record transforms.
//! Cycle-stateful mappers accumulate across the records of one harvest cycle
//! and emit summarized output from `flush`, which the aggregator calls
//! exactly once per cycle for each stateful mapper that saw a record.

pub mod events;
pub mod metrics;
pub mod registry;
pub mod summary;

use crate::core::errors::Result;
use crate::record::raw::RawRecord;
use crate::telemetry::item::TelemetryItem;

/// Converts records of a single event type into telemetry items.
pub trait Mapper: Send {
    /// The event type id this mapper handles.
    fn type_id(&self) -> &str;

    /// Map one record. Cycle-stateful mappers usually accumulate here and
    /// return nothing.
    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>>;

    /// Whether this mapper accumulates across a cycle and must be flushed.
    fn cycle_stateful(&self) -> bool {
        false
    }

    /// Emit and clear cycle-local state. Called once per cycle, after all
    /// records have been offered, for mappers that received at least one.
    fn flush(&mut self) -> Vec<TelemetryItem> {
        Vec::new()
    }
}
