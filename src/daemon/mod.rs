//! Daemon orchestration: service assembly, signals, state file.

pub mod service;
#[cfg(feature = "daemon")]
pub mod signals;
pub mod state;
