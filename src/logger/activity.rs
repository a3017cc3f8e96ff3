//! Activity logger thread: the pipeline's structured audit trail.
//!
//! Architecture: a dedicated logger thread owns the `JsonlWriter`. All other
//! threads send `ActivityEvent` via a bounded crossbeam channel. Non-blocking
//! `try_send()` ensures the harvest and delivery loops are never blocked by
//! logging back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{HarvestError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events that can be logged through the activity logger.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    CycleCompleted {
        sequence: u64,
        records: u64,
        items: u64,
        duration_ms: u64,
    },
    BatchEnqueued {
        sequence: u64,
        items: u64,
    },
    BatchDropped {
        sequence: u64,
        reason: String,
    },
    DeliverySucceeded {
        sequence: u64,
        items: u64,
        attempt: u32,
    },
    DeliveryRetried {
        sequence: u64,
        attempt: u32,
        reason: String,
    },
    DeliveryFailed {
        sequence: u64,
        reason: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
///
/// Internally wraps a bounded crossbeam `Sender`. The `send()` method uses
/// `try_send()` so callers are never blocked by logging back-pressure.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── configuration ────────────────────

/// Options for building the activity logger.
pub struct ActivityLoggerConfig {
    /// JSONL writer config.
    pub jsonl_config: JsonlConfig,
    /// Bounded channel capacity.
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl_config: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The returned handle is `Clone + Send` and can be shared across threads.
/// The logger thread runs until `handle.shutdown()` is called or all senders
/// are dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("jfrh-logger".to_string())
        .spawn(move || {
            logger_thread_main(rx, config.jsonl_config, dropped_clone);
        })
        .map_err(|e| HarvestError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

#[allow(clippy::needless_pass_by_value)]
fn logger_thread_main(
    rx: Receiver<ActivityEvent>,
    jsonl_config: JsonlConfig,
    dropped: Arc<AtomicU64>,
) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    // Process events until Shutdown or channel disconnect.
    while let Ok(event) = rx.recv() {
        // Report dropped events periodically.
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        let entry = event_to_log_entry(&event);
        jsonl.write_entry(&entry);
    }

    // Final flush.
    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::CycleCompleted {
            sequence,
            records,
            items,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::CycleComplete, Severity::Info);
            e.sequence = Some(*sequence);
            e.records = Some(*records);
            e.items = Some(*items);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::BatchEnqueued { sequence, items } => {
            let mut e = LogEntry::new(EventType::BatchEnqueued, Severity::Info);
            e.sequence = Some(*sequence);
            e.items = Some(*items);
            e.ok = Some(true);
            e
        }
        ActivityEvent::BatchDropped { sequence, reason } => {
            let mut e = LogEntry::new(EventType::BatchDropped, Severity::Warning);
            e.sequence = Some(*sequence);
            e.details = Some(reason.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::DeliverySucceeded {
            sequence,
            items,
            attempt,
        } => {
            let mut e = LogEntry::new(EventType::DeliverySuccess, Severity::Info);
            e.sequence = Some(*sequence);
            e.items = Some(*items);
            e.attempt = Some(*attempt);
            e.ok = Some(true);
            e
        }
        ActivityEvent::DeliveryRetried {
            sequence,
            attempt,
            reason,
        } => {
            let mut e = LogEntry::new(EventType::DeliveryRetry, Severity::Warning);
            e.sequence = Some(*sequence);
            e.attempt = Some(*attempt);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::DeliveryFailed { sequence, reason } => {
            let mut e = LogEntry::new(EventType::DeliveryFailure, Severity::Critical);
            e.sequence = Some(*sequence);
            e.details = Some(reason.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => {
            // Should not reach here; handled above.
            LogEntry::new(EventType::DaemonStop, Severity::Info)
        }
    }
}

// ──────────────────── tests ────────────────────
