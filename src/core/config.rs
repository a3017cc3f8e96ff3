//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HarvestError, Result};

/// Full harvester configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub queue: QueueConfig,
    pub delivery: DeliveryConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Harvest cycle cadence and mapping knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarvestConfig {
    /// Fixed cycle period. The next cycle starts this long after the
    /// previous cycle's start, or immediately if the previous cycle overran.
    pub interval_ms: u64,
    /// Regex used to collapse thread names into low-cardinality groups.
    pub thread_name_pattern: String,
}

/// Backpressure behavior when the delivery queue is saturated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Evict the oldest queued batch to make room (favors freshness).
    DropOldest,
    /// Reject the incoming batch (favors in-flight completeness).
    DropNewest,
}

/// Delivery queue sizing and saturation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub policy: BackpressurePolicy,
}

/// Retry, backoff, and shutdown-drain knobs for the delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Total send attempts per batch (first try included).
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// How long the worker keeps draining the queue after shutdown.
    pub drain_deadline_ms: u64,
    /// Serialized-payload ceiling for the built-in file sender.
    pub max_payload_bytes: u64,
}

/// Per-event-type toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EventsConfig {
    /// Event type ids whose mappers are not registered at startup.
    pub disabled: Vec<String>,
}

/// Activity-log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub channel_capacity: usize,
    pub max_size_bytes: u64,
    pub max_rotated_files: usize,
    pub fsync_interval_secs: u64,
}

/// Filesystem paths used by jfrh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Directory the recording session dumps chunk files into.
    pub spool_dir: PathBuf,
    pub state_file: PathBuf,
    pub jsonl_log: PathBuf,
    /// Destination for the built-in JSONL file sender.
    pub output_file: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            thread_name_pattern: crate::telemetry::thread_name::DEFAULT_PATTERN.to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            policy: BackpressurePolicy::DropOldest,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 15_000,
            drain_deadline_ms: 10_000,
            max_payload_bytes: 1_000_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1_024,
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
            fsync_interval_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[JFRH-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("jfrh").join("config.toml");
        let data = home_dir.join(".local").join("share").join("jfrh");
        Self {
            config_file: cfg,
            spool_dir: data.join("spool"),
            state_file: data.join("state.json"),
            jsonl_log: data.join("activity.jsonl"),
            output_file: data.join("telemetry.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HarvestError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HarvestError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher`
    /// whose seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // harvest
        set_env_u64("JFRH_HARVEST_INTERVAL_MS", &mut self.harvest.interval_ms)?;
        if let Some(raw) = env_var("JFRH_HARVEST_THREAD_NAME_PATTERN") {
            self.harvest.thread_name_pattern = raw;
        }

        // queue
        set_env_usize("JFRH_QUEUE_CAPACITY", &mut self.queue.capacity)?;
        if let Some(raw) = env_var("JFRH_QUEUE_POLICY") {
            self.queue.policy = match raw.as_str() {
                "drop_oldest" => BackpressurePolicy::DropOldest,
                "drop_newest" => BackpressurePolicy::DropNewest,
                other => {
                    return Err(HarvestError::InvalidConfig {
                        details: format!(
                            "JFRH_QUEUE_POLICY must be drop_oldest or drop_newest, got {other}"
                        ),
                    });
                }
            };
        }

        // delivery
        set_env_u32("JFRH_DELIVERY_MAX_ATTEMPTS", &mut self.delivery.max_attempts)?;
        set_env_u64(
            "JFRH_DELIVERY_BACKOFF_BASE_MS",
            &mut self.delivery.backoff_base_ms,
        )?;
        set_env_u64(
            "JFRH_DELIVERY_BACKOFF_CAP_MS",
            &mut self.delivery.backoff_cap_ms,
        )?;
        set_env_u64(
            "JFRH_DELIVERY_DRAIN_DEADLINE_MS",
            &mut self.delivery.drain_deadline_ms,
        )?;
        set_env_u64(
            "JFRH_DELIVERY_MAX_PAYLOAD_BYTES",
            &mut self.delivery.max_payload_bytes,
        )?;

        // events
        if let Some(raw) = env_var("JFRH_EVENTS_DISABLED") {
            self.events.disabled = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        // logging
        set_env_usize(
            "JFRH_LOGGING_CHANNEL_CAPACITY",
            &mut self.logging.channel_capacity,
        )?;

        // paths
        if let Some(raw) = env_var("JFRH_PATHS_SPOOL_DIR") {
            self.paths.spool_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("JFRH_PATHS_OUTPUT_FILE") {
            self.paths.output_file = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.harvest.interval_ms == 0 {
            return Err(HarvestError::InvalidConfig {
                details: "harvest.interval_ms must be >= 1".to_string(),
            });
        }
        if regex::Regex::new(&self.harvest.thread_name_pattern).is_err() {
            return Err(HarvestError::InvalidConfig {
                details: format!(
                    "harvest.thread_name_pattern is not a valid regex: {}",
                    self.harvest.thread_name_pattern
                ),
            });
        }
        if self.queue.capacity == 0 {
            return Err(HarvestError::InvalidConfig {
                details: "queue.capacity must be >= 1".to_string(),
            });
        }
        if self.delivery.max_attempts == 0 {
            return Err(HarvestError::InvalidConfig {
                details: "delivery.max_attempts must be >= 1".to_string(),
            });
        }
        if self.delivery.backoff_base_ms == 0 {
            return Err(HarvestError::InvalidConfig {
                details: "delivery.backoff_base_ms must be >= 1".to_string(),
            });
        }
        if self.delivery.backoff_cap_ms < self.delivery.backoff_base_ms {
            return Err(HarvestError::InvalidConfig {
                details: format!(
                    "delivery.backoff_cap_ms ({}) must be >= backoff_base_ms ({})",
                    self.delivery.backoff_cap_ms, self.delivery.backoff_base_ms
                ),
            });
        }
        if self.delivery.max_payload_bytes < 1_024 {
            return Err(HarvestError::InvalidConfig {
                details: format!(
                    "delivery.max_payload_bytes ({}) must be >= 1024",
                    self.delivery.max_payload_bytes
                ),
            });
        }
        if self.logging.channel_capacity == 0 {
            return Err(HarvestError::InvalidConfig {
                details: "logging.channel_capacity must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

// ──────────────────── env parsing helpers ────────────────────

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn set_env_u64(name: &str, target: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *target = raw.parse().map_err(|_| HarvestError::InvalidConfig {
            details: format!("{name} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_u32(name: &str, target: &mut u32) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *target = raw.parse().map_err(|_| HarvestError::InvalidConfig {
            details: format!("{name} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, target: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *target = raw.parse().map_err(|_| HarvestError::InvalidConfig {
            details: format!("{name} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn load_explicit_missing_path_errors() {
        let err = Config::load(Some(Path::new("/nonexistent/jfrh.toml"))).unwrap_err();
        assert_eq!(err.code(), "JFRH-1002");
    }

    #[test]
    fn load_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[harvest]
interval_ms = 5000

[queue]
capacity = 8
policy = "drop_newest"

[events]
disabled = ["jdk.ThreadCPULoad"]
"#,
        )
        .unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.harvest.interval_ms, 5_000);
        assert_eq!(cfg.queue.capacity, 8);
        assert_eq!(cfg.queue.policy, BackpressurePolicy::DropNewest);
        assert_eq!(cfg.events.disabled, vec!["jdk.ThreadCPULoad".to_string()]);
    }

    #[test]
    fn rejects_zero_interval() {
        let mut cfg = Config::default();
        cfg.harvest.interval_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "JFRH-1001");
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let mut cfg = Config::default();
        cfg.queue.capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_backoff_cap_below_base() {
        let mut cfg = Config::default();
        cfg.delivery.backoff_base_ms = 5_000;
        cfg.delivery.backoff_cap_ms = 1_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_invalid_thread_name_pattern() {
        let mut cfg = Config::default();
        cfg.harvest.thread_name_pattern = "([unclosed".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let a = Config::default();
        let b = Config::default();
        assert_eq!(a.stable_hash().unwrap(), b.stable_hash().unwrap());

        let mut c = Config::default();
        c.harvest.interval_ms = 1;
        assert_ne!(a.stable_hash().unwrap(), c.stable_hash().unwrap());
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let raw = toml::to_string(&cfg).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(cfg, parsed);
    }
}
