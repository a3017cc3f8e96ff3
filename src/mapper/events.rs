//! Stateless event and span mappers: discrete occurrences worth reporting
//! individually.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::Result;
use crate::mapper::Mapper;
use crate::record::raw::RawRecord;
use crate::telemetry::attributes::Attributes;
use crate::telemetry::item::{LogEvent, Span, TelemetryItem};
use crate::telemetry::thread_name::ThreadNameNormalizer;

// ──────────────────── jdk.JavaMonitorWait ────────────────────

/// Contended-monitor waits above the noise threshold become spans.
pub struct MonitorWaitMapper {
    normalizer: Arc<ThreadNameNormalizer>,
    next_span: u64,
}

impl MonitorWaitMapper {
    pub const EVENT_NAME: &'static str = "jdk.JavaMonitorWait";

    /// Waits at or below this duration are uninteresting lock churn.
    const MIN_WAIT: Duration = Duration::from_millis(20);

    #[must_use]
    pub fn new(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self {
            normalizer,
            next_span: 0,
        }
    }
}

impl Mapper for MonitorWaitMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let Some(duration) = record.duration() else {
            return Ok(Vec::new());
        };
        if duration <= Self::MIN_WAIT {
            return Ok(Vec::new());
        }

        let mut attr = Attributes::new();
        if let Some(thread) = record.str_field("eventThread") {
            attr.insert("thread.name", self.normalizer.normalize(thread));
        }
        if let Some(class) = record.str_field("monitorClass") {
            attr.insert("class", class);
        }
        attr.insert("duration", duration.as_millis() as i64);

        let start_ms = record.timestamp_ms();
        self.next_span += 1;
        let span = Span {
            id: format!("jmw-{start_ms:x}-{:x}", self.next_span),
            parent_id: None,
            name: "JfrJavaMonitorWait".to_string(),
            start_ms,
            end_ms: start_ms + duration.as_millis() as i64,
            attributes: attr,
        };
        Ok(vec![span.into()])
    }
}

// ──────────────────── jdk.Compilation ────────────────────

/// JIT compilation completions as structured events.
pub struct JitCompilationMapper {
    normalizer: Arc<ThreadNameNormalizer>,
}

impl JitCompilationMapper {
    pub const EVENT_NAME: &'static str = "jdk.Compilation";

    #[must_use]
    pub fn new(normalizer: Arc<ThreadNameNormalizer>) -> Self {
        Self { normalizer }
    }
}

impl Mapper for JitCompilationMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let mut attr = Attributes::new();
        if let Some(method) = record.str_field("method") {
            attr.insert("desc", method);
        }
        if let Some(thread) = record.str_field("eventThread") {
            attr.insert("thread.name", self.normalizer.normalize(thread));
        }
        if let Some(duration) = record.duration() {
            attr.insert("duration", duration.as_millis() as i64);
        }
        if let Some(succeeded) = record.bool_field("succeeded") {
            attr.insert("succeeded", succeeded);
        }

        Ok(vec![
            LogEvent {
                name: "JfrCompilation".to_string(),
                timestamp_ms: record.timestamp_ms(),
                attributes: attr,
            }
            .into(),
        ])
    }
}

// ──────────────────── jdk.JVMInformation ────────────────────

/// Startup-time JVM identity event; occurs once per process.
#[derive(Debug, Default)]
pub struct JvmInformationMapper;

impl JvmInformationMapper {
    pub const EVENT_NAME: &'static str = "jdk.JVMInformation";
}

impl Mapper for JvmInformationMapper {
    fn type_id(&self) -> &str {
        Self::EVENT_NAME
    }

    fn map(&mut self, record: &RawRecord) -> Result<Vec<TelemetryItem>> {
        let mut attr = Attributes::new();
        if let Some(args) = record.str_field("jvmArguments") {
            attr.insert("jvmArguments", args);
        }
        if let Some(version) = record.str_field("jvmVersion") {
            attr.insert("jvmVersion", version);
        }
        if let Some(start) = record.int("jvmStartTime") {
            attr.insert("jvmStartTime", start);
        }

        Ok(vec![
            LogEvent {
                name: "JfrJVMInformation".to_string(),
                timestamp_ms: record.timestamp_ms(),
                attributes: attr,
            }
            .into(),
        ])
    }
}
