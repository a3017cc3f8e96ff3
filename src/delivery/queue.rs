//! Bounded delivery queue decoupling harvest cadence from network latency.
//!
//! A single-producer/single-consumer crossbeam channel carries finalized
//! batches from the scheduler to the delivery worker. Saturation applies the
//! configured backpressure policy; dropping is always counted and logged,
//! never silent. Drop-oldest is implemented at the push site by evicting the
//! head before re-offering, which keeps the channel itself a plain bounded
//! FIFO.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::BackpressurePolicy;
use crate::harvest::batch::Batch;
use crate::harvest::counters::PipelineCounters;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Build the delivery queue, returning the scheduler-side producer and the
/// worker-side consumer.
#[must_use]
pub fn delivery_queue(
    capacity: usize,
    policy: BackpressurePolicy,
    counters: Arc<PipelineCounters>,
    logger: ActivityLoggerHandle,
) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = bounded::<Batch>(capacity);
    (
        BatchSender {
            tx,
            evict_rx: rx.clone(),
            policy,
            counters,
            logger,
        },
        BatchReceiver { rx },
    )
}

/// Producer end, owned by the harvest scheduler.
pub struct BatchSender {
    tx: Sender<Batch>,
    /// Second handle on the queue head, used only to evict under
    /// drop-oldest.
    evict_rx: Receiver<Batch>,
    policy: BackpressurePolicy,
    counters: Arc<PipelineCounters>,
    logger: ActivityLoggerHandle,
}

impl BatchSender {
    /// Offer a batch. Returns whether the batch was accepted.
    ///
    /// Never blocks: saturation resolves immediately through the configured
    /// policy.
    pub fn push(&self, batch: Batch) -> bool {
        match self.policy {
            BackpressurePolicy::DropNewest => match self.tx.try_send(batch) {
                Ok(()) => true,
                Err(TrySendError::Full(rejected)) => {
                    self.record_drop(rejected.sequence(), "queue full (drop_newest)");
                    false
                }
                Err(TrySendError::Disconnected(rejected)) => {
                    self.record_drop(rejected.sequence(), "delivery worker gone");
                    false
                }
            },
            BackpressurePolicy::DropOldest => {
                let mut batch = batch;
                loop {
                    match self.tx.try_send(batch) {
                        Ok(()) => return true,
                        Err(TrySendError::Full(bounced)) => {
                            batch = bounced;
                            if let Ok(evicted) = self.evict_rx.try_recv() {
                                self.record_drop(
                                    evicted.sequence(),
                                    "queue full (drop_oldest)",
                                );
                            }
                            // Head consumed meanwhile; just re-offer.
                        }
                        Err(TrySendError::Disconnected(rejected)) => {
                            self.record_drop(rejected.sequence(), "delivery worker gone");
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Number of batches currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    fn record_drop(&self, sequence: u64, reason: &str) {
        self.counters.record_dropped_batch();
        self.logger.send(ActivityEvent::BatchDropped {
            sequence,
            reason: reason.to_string(),
        });
    }
}

/// Consumer end, owned by the delivery worker.
pub struct BatchReceiver {
    rx: Receiver<Batch>,
}

impl BatchReceiver {
    /// Wait up to `timeout` for the next batch.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Batch> {
        self.rx.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn try_recv(&self) -> Option<Batch> {
        self.rx.try_recv().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
