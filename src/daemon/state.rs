//! Operational state file: periodic `state.json` snapshots for CLI and ops
//! tooling.
//!
//! Written atomically (tmp + rename) so readers never see a torn file. The
//! writer rate-limits itself; callers can invoke it every loop tick.

#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HarvestError, Result};
use crate::harvest::counters::CountersSnapshot;

/// Minimum spacing between state writes.
const WRITE_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot serialized into state.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// ISO 8601 UTC timestamp of the snapshot.
    pub ts: String,
    pub version: String,
    pub uptime_secs: u64,
    pub counters: CountersSnapshot,
    /// Activity-log events dropped due to channel back-pressure.
    pub dropped_log_events: u64,
}

impl StateSnapshot {
    #[must_use]
    pub fn new(uptime_secs: u64, counters: CountersSnapshot, dropped_log_events: u64) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            counters,
            dropped_log_events,
        }
    }
}

/// Rate-limited atomic writer for state.json.
pub struct StateWriter {
    path: PathBuf,
    last_write: Option<Instant>,
}

impl StateWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_write: None,
        }
    }

    /// Write if the rate limit allows; errors are returned but safe to
    /// ignore (state.json is advisory).
    pub fn maybe_write(&mut self, snapshot: &StateSnapshot) -> Result<bool> {
        if self
            .last_write
            .is_some_and(|at| at.elapsed() < WRITE_INTERVAL)
        {
            return Ok(false);
        }
        self.write_now(snapshot)?;
        Ok(true)
    }

    /// Unconditional write (used at shutdown).
    pub fn write_now(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| HarvestError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| HarvestError::io(&tmp, source))?;
        fs::rename(&tmp, &self.path).map_err(|source| HarvestError::io(&self.path, source))?;
        self.last_write = Some(Instant::now());
        Ok(())
    }
}
