//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use jfr_harvester::prelude::*;
//! ```

// Core
pub use crate::core::config::{BackpressurePolicy, Config};
pub use crate::core::errors::{HarvestError, Result};
pub use crate::core::shutdown::{ShutdownFlag, TriggerFlag};

// Records
pub use crate::record::raw::{FieldValue, RawRecord};
pub use crate::record::source::{DrainChunk, RecordSource, ReplaySource};
pub use crate::record::spool::{ChunkDecoder, JsonChunkDecoder, SpoolDirectorySource};

// Telemetry model
pub use crate::telemetry::attributes::{AttrValue, Attributes};
pub use crate::telemetry::item::{LogEvent, Metric, MetricKind, Span, TelemetryItem};

// Mapping and aggregation
pub use crate::harvest::aggregator::Aggregator;
pub use crate::harvest::batch::Batch;
pub use crate::harvest::counters::{CountersSnapshot, PipelineCounters};
pub use crate::harvest::scheduler::{CyclePhase, HarvestScheduler};
pub use crate::mapper::Mapper;
pub use crate::mapper::registry::{MapperRegistry, default_registry};

// Delivery
pub use crate::delivery::sender::{JsonlFileSender, SendOutcome, TelemetrySender};

// Daemon
pub use crate::daemon::service::HarvesterDaemon;
