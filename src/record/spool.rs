//! Spool-directory record source: drains chunk files dumped by the recording
//! session, decoding each through a supplied decoder.
//!
//! The recording side periodically drops one chunk file per dump into the
//! spool directory. Each drain processes every pending file in name order
//! (dump files sort chronologically), filters records at or below the
//! last-seen watermark so overlapping dumps do not duplicate records, and
//! deletes each file once consumed. A missing spool directory means the
//! recording session is gone, which is the one fatal source failure.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::{HarvestError, Result};
use crate::record::raw::{FieldValue, RawRecord};
use crate::record::source::{DrainChunk, RecordSource};

/// Decodes one chunk file's bytes into records.
///
/// Supplied by the embedding process; the harvester never interprets the
/// recording format itself. A decoder error condemns that file only.
pub trait ChunkDecoder: Send {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<RawRecord>>;
}

/// Record source backed by a spool directory of chunk files.
pub struct SpoolDirectorySource {
    dir: PathBuf,
    decoder: Box<dyn ChunkDecoder>,
    last_seen_ms: i64,
    closed: bool,
}

impl SpoolDirectorySource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, decoder: Box<dyn ChunkDecoder>) -> Self {
        Self {
            dir: dir.into(),
            decoder,
            last_seen_ms: i64::MIN,
            closed: false,
        }
    }

    /// Watermark of the newest record consumed so far (epoch millis).
    #[must_use]
    pub const fn last_seen_ms(&self) -> i64 {
        self.last_seen_ms
    }

    fn pending_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| HarvestError::SourceClosed {
            details: format!("spool directory {} unreadable: {e}", self.dir.display()),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    fn consume_file(&mut self, path: &Path, chunk: &mut DrainChunk) {
        let outcome = fs::read(path)
            .map_err(|e| HarvestError::Decode {
                details: format!("unreadable chunk {}: {e}", path.display()),
            })
            .and_then(|bytes| self.decoder.decode(&bytes));

        match outcome {
            Ok(records) => {
                for record in records {
                    // Watermark filter: overlapping dumps re-emit old records.
                    if record.timestamp_ms() > self.last_seen_ms {
                        self.last_seen_ms = record.timestamp_ms();
                        chunk.records.push(record);
                    }
                }
            }
            Err(e) => {
                chunk.decode_errors += 1;
                eprintln!("[JFRH-SPOOL] skipping chunk {}: {e}", path.display());
            }
        }

        // Consumed either way; a poison file must not wedge the spool.
        if let Err(e) = fs::remove_file(path) {
            eprintln!("[JFRH-SPOOL] failed to delete chunk {}: {e}", path.display());
        }
    }
}

impl RecordSource for SpoolDirectorySource {
    fn drain(&mut self) -> Result<DrainChunk> {
        if self.closed {
            return Err(HarvestError::SourceClosed {
                details: "source already closed".to_string(),
            });
        }
        let files = self.pending_files()?;
        let mut chunk = DrainChunk::default();
        for path in files {
            self.consume_file(&path, &mut chunk);
        }
        Ok(chunk)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ──────────────────── JSON chunk decoder ────────────────────

/// Built-in decoder for JSON-lines chunk files.
///
/// One record per line: `{"type": "...", "timestamp": ms, "duration_ms": n?,
/// "fields": {..}}`. Numbers with a fraction decode as Float, integers as
/// Int; objects nest.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChunkDecoder;

impl JsonChunkDecoder {
    fn record_from_value(value: &serde_json::Value) -> Result<RawRecord> {
        let obj = value.as_object().ok_or_else(|| HarvestError::Decode {
            details: "chunk line is not an object".to_string(),
        })?;
        let type_id = obj
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| HarvestError::Decode {
                details: "record missing string field: type".to_string(),
            })?;
        let timestamp_ms = obj
            .get("timestamp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| HarvestError::Decode {
                details: "record missing integer field: timestamp".to_string(),
            })?;

        let mut record = RawRecord::new(type_id, timestamp_ms);
        if let Some(ms) = obj.get("duration_ms").and_then(serde_json::Value::as_u64) {
            record = record.with_duration(Duration::from_millis(ms));
        }
        if let Some(fields) = obj.get("fields").and_then(serde_json::Value::as_object) {
            for (name, value) in fields {
                record = record.with_field(name, Self::field_from_value(value)?);
            }
        }
        Ok(record)
    }

    fn field_from_value(value: &serde_json::Value) -> Result<FieldValue> {
        match value {
            serde_json::Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || {
                    n.as_f64().map(FieldValue::Float).ok_or_else(|| {
                        HarvestError::Decode {
                            details: format!("unrepresentable number: {n}"),
                        }
                    })
                },
                |i| Ok(FieldValue::Int(i)),
            ),
            serde_json::Value::String(s) => Ok(FieldValue::Str(s.clone())),
            serde_json::Value::Object(map) => {
                let mut nested = Vec::with_capacity(map.len());
                for (name, inner) in map {
                    nested.push((name.clone(), Self::field_from_value(inner)?));
                }
                Ok(FieldValue::Nested(nested))
            }
            other => Err(HarvestError::Decode {
                details: format!("unsupported field value: {other}"),
            }),
        }
    }
}

impl ChunkDecoder for JsonChunkDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<RawRecord>> {
        let text = std::str::from_utf8(bytes).map_err(|e| HarvestError::Decode {
            details: format!("chunk is not UTF-8: {e}"),
        })?;
        let mut records = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| HarvestError::Decode {
                    details: format!("chunk line is not JSON: {e}"),
                })?;
            records.push(Self::record_from_value(&value)?);
        }
        Ok(records)
    }
}
