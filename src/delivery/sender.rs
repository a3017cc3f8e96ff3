//! Telemetry sender contract plus the built-in file sender.
//!
//! The sender owns serialization, authentication, and transport; the worker
//! only sees the three-way (plus payload-size) outcome.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::harvest::batch::Batch;

/// Result of one send attempt, as classified by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    /// Transport-level transient failure: timeout, refused connection,
    /// 5xx-equivalent. Worth retrying with backoff.
    Retryable(String),
    /// Backend rejection, 4xx-equivalent. Never retried.
    Permanent(String),
    /// The serialized batch exceeds the backend's payload limit; the worker
    /// splits and resends halves.
    PayloadTooLarge,
}

/// External delivery collaborator.
pub trait TelemetrySender: Send {
    fn send(&mut self, batch: &Batch) -> SendOutcome;
}

/// Default sender: serialized batches appended to a JSONL file.
///
/// One line per batch. Mirrors a real ingest transport closely enough to
/// exercise the whole outcome surface: IO failures classify as retryable and
/// oversized payloads as too-large.
pub struct JsonlFileSender {
    path: PathBuf,
    max_payload_bytes: u64,
}

impl JsonlFileSender {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_payload_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_payload_bytes,
        }
    }
}

impl TelemetrySender for JsonlFileSender {
    fn send(&mut self, batch: &Batch) -> SendOutcome {
        let line = match serde_json::to_string(batch) {
            Ok(json) => json,
            Err(e) => return SendOutcome::Permanent(format!("unserializable batch: {e}")),
        };
        if line.len() as u64 > self.max_payload_bytes {
            return SendOutcome::PayloadTooLarge;
        }

        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return SendOutcome::Retryable(format!("output directory: {e}"));
            }
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        match result {
            Ok(()) => SendOutcome::Success,
            Err(e) => SendOutcome::Retryable(format!("append failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::attributes::Attributes;
    use crate::telemetry::item::Metric;

    fn small_batch() -> Batch {
        Batch::new(
            1,
            0,
            100,
            vec![Metric::count("c", 1.0, 50, Attributes::new()).into()],
        )
    }

    #[test]
    fn appends_one_line_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sender = JsonlFileSender::new(&path, 1_000_000);

        assert_eq!(sender.send(&small_batch()), SendOutcome::Success);
        assert_eq!(sender.send(&small_batch()), SendOutcome::Success);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed: serde_json::Value =
            serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["sequence"], 1);
    }

    #[test]
    fn oversized_batch_reports_payload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut sender = JsonlFileSender::new(dir.path().join("out.jsonl"), 16);
        assert_eq!(sender.send(&small_batch()), SendOutcome::PayloadTooLarge);
    }

    #[test]
    fn unwritable_path_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let mut sender = JsonlFileSender::new(blocker.join("out.jsonl"), 1_000_000);
        assert!(matches!(
            sender.send(&small_batch()),
            SendOutcome::Retryable(_)
        ));
    }
}
