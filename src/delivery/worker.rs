//! Delivery worker: single consumer of the delivery queue.
//!
//! Batches are sent in finalize order, never reordered. Retries for one
//! batch happen inside the worker (the main queue is untouched), so new
//! harvest cycles keep enqueuing while a batch backs off. On shutdown the
//! worker keeps draining until the queue is empty or the drain deadline
//! passes, then abandons whatever remains.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::DeliveryConfig;
use crate::core::errors::{HarvestError, Result};
use crate::core::shutdown::ShutdownFlag;
use crate::delivery::backoff::Backoff;
use crate::delivery::queue::BatchReceiver;
use crate::delivery::sender::{SendOutcome, TelemetrySender};
use crate::harvest::batch::Batch;
use crate::harvest::counters::PipelineCounters;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Idle poll period while waiting for batches.
const RECV_POLL: Duration = Duration::from_millis(100);
/// Slice size for interruptible backoff sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Worker knobs derived from [`DeliveryConfig`].
#[derive(Debug, Clone, Copy)]
pub struct DeliveryWorkerConfig {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub drain_deadline: Duration,
}

impl DeliveryWorkerConfig {
    #[must_use]
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_cap_ms),
            ),
            drain_deadline: Duration::from_millis(config.drain_deadline_ms),
        }
    }
}

/// Spawn the delivery worker thread.
pub fn spawn_delivery_worker(
    receiver: BatchReceiver,
    sender: Box<dyn TelemetrySender>,
    config: DeliveryWorkerConfig,
    counters: Arc<PipelineCounters>,
    logger: ActivityLoggerHandle,
    shutdown: ShutdownFlag,
) -> Result<thread::JoinHandle<()>> {
    let mut worker = DeliveryWorker {
        receiver,
        sender,
        config,
        counters,
        logger,
        shutdown,
        shutdown_observed_at: None,
    };
    thread::Builder::new()
        .name("jfrh-delivery".to_string())
        .spawn(move || worker.run())
        .map_err(|e| HarvestError::Runtime {
            details: format!("failed to spawn delivery thread: {e}"),
        })
}

struct DeliveryWorker {
    receiver: BatchReceiver,
    sender: Box<dyn TelemetrySender>,
    config: DeliveryWorkerConfig,
    counters: Arc<PipelineCounters>,
    logger: ActivityLoggerHandle,
    shutdown: ShutdownFlag,
    shutdown_observed_at: Option<Instant>,
}

impl DeliveryWorker {
    fn run(&mut self) {
        loop {
            if self.shutdown.is_requested() {
                // Drain mode: no waiting, stop on empty queue or deadline.
                if self.past_drain_deadline() {
                    break;
                }
                match self.receiver.try_recv() {
                    Some(batch) => self.deliver(batch),
                    None => break,
                }
            } else if let Some(batch) = self.receiver.recv_timeout(RECV_POLL) {
                self.deliver(batch);
            }
        }
    }

    fn deliver(&mut self, batch: Batch) {
        let sequence = batch.sequence();
        let items = batch.len() as u64;
        let mut attempt: u32 = 1;

        loop {
            match self.sender.send(&batch) {
                SendOutcome::Success => {
                    self.counters.record_successful_batch();
                    self.logger.send(ActivityEvent::DeliverySucceeded {
                        sequence,
                        items,
                        attempt,
                    });
                    return;
                }
                SendOutcome::Permanent(reason) => {
                    self.counters.record_permanent_failure();
                    self.logger
                        .send(ActivityEvent::DeliveryFailed { sequence, reason });
                    return;
                }
                SendOutcome::PayloadTooLarge => {
                    self.split_and_resend_once(batch);
                    return;
                }
                SendOutcome::Retryable(reason) => {
                    self.counters.record_retried_send();
                    self.logger.send(ActivityEvent::DeliveryRetried {
                        sequence,
                        attempt,
                        reason,
                    });
                    if attempt >= self.config.max_attempts {
                        self.counters.record_permanent_failure();
                        self.logger.send(ActivityEvent::DeliveryFailed {
                            sequence,
                            reason: format!("retries exhausted after {attempt} attempts"),
                        });
                        return;
                    }
                    if !self.backoff_sleep(attempt) {
                        self.counters.record_permanent_failure();
                        self.logger.send(ActivityEvent::DeliveryFailed {
                            sequence,
                            reason: "abandoned at shutdown deadline".to_string(),
                        });
                        return;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Halve an oversized batch and send each half exactly once. No
    /// recursive splitting: a half that still fails is dropped and counted.
    fn split_and_resend_once(&mut self, batch: Batch) {
        let sequence = batch.sequence();
        let (front, back) = batch.split_halves();
        for half in [front, back] {
            if half.is_empty() {
                continue;
            }
            let items = half.len() as u64;
            match self.sender.send(&half) {
                SendOutcome::Success => {
                    self.counters.record_successful_batch();
                    self.logger.send(ActivityEvent::DeliverySucceeded {
                        sequence,
                        items,
                        attempt: 1,
                    });
                }
                SendOutcome::Retryable(reason) | SendOutcome::Permanent(reason) => {
                    self.counters.record_permanent_failure();
                    self.logger.send(ActivityEvent::DeliveryFailed {
                        sequence,
                        reason: format!("split half dropped: {reason}"),
                    });
                }
                SendOutcome::PayloadTooLarge => {
                    self.counters.record_permanent_failure();
                    self.logger.send(ActivityEvent::DeliveryFailed {
                        sequence,
                        reason: "split half still too large".to_string(),
                    });
                }
            }
        }
    }

    /// Sleep through one backoff period in interruptible slices. Returns
    /// false if the shutdown drain deadline arrived mid-sleep.
    fn backoff_sleep(&mut self, attempt: u32) -> bool {
        let mut remaining = self.config.backoff.jittered_delay(attempt);
        while remaining > Duration::ZERO {
            if self.shutdown.is_requested() && self.past_drain_deadline() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        true
    }

    fn past_drain_deadline(&mut self) -> bool {
        let observed = *self.shutdown_observed_at.get_or_insert_with(Instant::now);
        observed.elapsed() >= self.config.drain_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::core::config::BackpressurePolicy;
    use crate::delivery::queue::delivery_queue;
    use crate::logger::activity::{ActivityLoggerConfig, spawn_logger};
    use crate::logger::jsonl::JsonlConfig;
    use crate::telemetry::attributes::Attributes;
    use crate::telemetry::item::Metric;

    /// Sender that replays scripted outcomes and records every call.
    struct ScriptedSender {
        outcomes: VecDeque<SendOutcome>,
        calls: Arc<Mutex<Vec<(u64, usize)>>>,
    }

    impl ScriptedSender {
        fn new(outcomes: Vec<SendOutcome>) -> (Self, Arc<Mutex<Vec<(u64, usize)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    outcomes: outcomes.into(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl TelemetrySender for ScriptedSender {
        fn send(&mut self, batch: &Batch) -> SendOutcome {
            self.calls.lock().unwrap().push((batch.sequence(), batch.len()));
            self.outcomes.pop_front().unwrap_or(SendOutcome::Success)
        }
    }

    fn fast_config(max_attempts: u32) -> DeliveryWorkerConfig {
        DeliveryWorkerConfig {
            max_attempts,
            backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(2)),
            drain_deadline: Duration::from_millis(500),
        }
    }

    fn test_logger(dir: &std::path::Path) -> ActivityLoggerHandle {
        let (handle, _join) = spawn_logger(ActivityLoggerConfig {
            jsonl_config: JsonlConfig {
                path: dir.join("worker.jsonl"),
                fallback_path: None,
                max_size_bytes: 1024 * 1024,
                max_rotated_files: 1,
                fsync_interval_secs: 60,
            },
            channel_capacity: 256,
        })
        .unwrap();
        handle
    }

    #[allow(clippy::cast_possible_wrap)]
    fn batch_with_items(sequence: u64, n: usize) -> Batch {
        let items = (0..n)
            .map(|i| Metric::count(format!("m{i}"), 1.0, i as i64, Attributes::new()).into())
            .collect();
        Batch::new(sequence, 0, 100, items)
    }

    /// Run the worker over pre-queued batches until the queue drains.
    fn run_worker(
        batches: Vec<Batch>,
        sender: ScriptedSender,
        config: DeliveryWorkerConfig,
    ) -> Arc<PipelineCounters> {
        let dir = tempfile::tempdir().unwrap();
        let counters = Arc::new(PipelineCounters::new());
        let logger = test_logger(dir.path());
        let (tx, rx) = delivery_queue(
            batches.len().max(1),
            BackpressurePolicy::DropOldest,
            Arc::clone(&counters),
            logger.clone(),
        );
        for batch in batches {
            assert!(tx.push(batch));
        }

        let shutdown = ShutdownFlag::new();
        shutdown.request(); // drain mode: worker exits once the queue is empty
        let join = spawn_delivery_worker(
            rx,
            Box::new(sender),
            config,
            Arc::clone(&counters),
            logger,
            shutdown,
        )
        .unwrap();
        join.join().unwrap();
        counters
    }

    #[test]
    fn transient_failures_then_success_counts_one_success() {
        let (sender, calls) = ScriptedSender::new(vec![
            SendOutcome::Retryable("timeout".into()),
            SendOutcome::Retryable("timeout".into()),
            SendOutcome::Success,
        ]);
        let counters = run_worker(vec![batch_with_items(1, 2)], sender, fast_config(6));

        let snap = counters.snapshot();
        assert_eq!(snap.successful_batches, 1);
        assert_eq!(snap.permanent_failures, 0);
        assert_eq!(snap.retried_sends, 2);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn exhausted_retries_count_one_permanent_failure() {
        let (sender, calls) = ScriptedSender::new(vec![
            SendOutcome::Retryable("refused".into()),
            SendOutcome::Retryable("refused".into()),
            SendOutcome::Retryable("refused".into()),
        ]);
        let counters = run_worker(vec![batch_with_items(1, 2)], sender, fast_config(3));

        let snap = counters.snapshot();
        assert_eq!(snap.successful_batches, 0);
        assert_eq!(snap.permanent_failures, 1);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn permanent_rejection_drops_without_retry() {
        let (sender, calls) = ScriptedSender::new(vec![SendOutcome::Permanent("400".into())]);
        let counters = run_worker(vec![batch_with_items(1, 2)], sender, fast_config(6));

        let snap = counters.snapshot();
        assert_eq!(snap.permanent_failures, 1);
        assert_eq!(snap.retried_sends, 0);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn payload_too_large_splits_and_sends_halves_once() {
        let (sender, calls) = ScriptedSender::new(vec![
            SendOutcome::PayloadTooLarge,
            SendOutcome::Success,
            SendOutcome::Success,
        ]);
        let counters = run_worker(vec![batch_with_items(1, 4)], sender, fast_config(6));

        let snap = counters.snapshot();
        assert_eq!(snap.successful_batches, 2);
        assert_eq!(snap.permanent_failures, 0);

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(1, 4), (1, 2), (1, 2)],
            "full batch then two halves"
        );
    }

    #[test]
    fn half_that_fails_again_is_dropped_not_resplit() {
        let (sender, calls) = ScriptedSender::new(vec![
            SendOutcome::PayloadTooLarge,
            SendOutcome::PayloadTooLarge,
            SendOutcome::Success,
        ]);
        let counters = run_worker(vec![batch_with_items(1, 4)], sender, fast_config(6));

        let snap = counters.snapshot();
        assert_eq!(snap.successful_batches, 1);
        assert_eq!(snap.permanent_failures, 1);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn batches_are_delivered_in_finalize_order() {
        let (sender, calls) = ScriptedSender::new(Vec::new());
        run_worker(
            vec![
                batch_with_items(1, 1),
                batch_with_items(2, 1),
                batch_with_items(3, 1),
            ],
            sender,
            fast_config(3),
        );

        let sequences: Vec<u64> = calls.lock().unwrap().iter().map(|(s, _)| *s).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }
}
