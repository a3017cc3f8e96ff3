#![forbid(unsafe_code)]

//! JFR Harvester (jfrh) — telemetry collector daemon for JVM flight
//! recordings.
//!
//! The pipeline runs one direction:
//! 1. **Record source** — drains decoded events from the recording session
//! 2. **Mapper registry** — converts each event into metrics/spans/events
//! 3. **Aggregator** — merges same-identity metrics into one batch per cycle
//! 4. **Delivery queue** — bounded buffer with explicit backpressure policy
//! 5. **Delivery worker** — sends batches with retry, backoff, and splitting
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use jfr_harvester::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use jfr_harvester::core::config::Config;
//! use jfr_harvester::daemon::service::HarvesterDaemon;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod delivery;
pub mod harvest;
pub mod logger;
pub mod mapper;
pub mod record;
pub mod telemetry;
