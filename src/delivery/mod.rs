//! Batch delivery: bounded queue, retrying worker, sender contract.

pub mod backoff;
pub mod queue;
pub mod sender;
pub mod worker;
