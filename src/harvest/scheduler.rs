//! Harvest scheduler: the fixed-period drain→map→finalize→enqueue loop.
//!
//! One cycle walks the phases Draining → Mapping → Finalizing → Enqueuing,
//! then Idle until the next period. The period is not drift-corrected: the
//! next cycle starts `interval` after the previous cycle's start, or
//! immediately if the previous cycle overran. Shutdown is only honored at
//! phase boundaries, so an in-flight cycle always finishes finalizing and
//! enqueuing before the loop exits.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::errors::Result;
use crate::core::shutdown::{ShutdownFlag, TriggerFlag};
use crate::delivery::queue::BatchSender;
use crate::harvest::aggregator::Aggregator;
use crate::harvest::counters::PipelineCounters;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::record::source::RecordSource;

/// Slice size for interruptible interval waits.
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Scheduler state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Draining,
    Mapping,
    Finalizing,
    Enqueuing,
    Stopped,
}

/// The one process-wide piece of open-cycle state: the current aggregator
/// and the monotonically increasing cycle sequence.
pub struct HarvestCycleState {
    aggregator: Aggregator,
    next_sequence: u64,
}

impl HarvestCycleState {
    #[must_use]
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            next_sequence: 1,
        }
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// Outcome of one harvest cycle, for logging and tests.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub sequence: u64,
    pub records: u64,
    pub decode_errors: u64,
    pub items: u64,
    pub enqueued: bool,
}

/// Drives the harvest loop; owns the record source and cycle state.
pub struct HarvestScheduler {
    source: Box<dyn RecordSource>,
    state: HarvestCycleState,
    queue: BatchSender,
    counters: Arc<PipelineCounters>,
    logger: ActivityLoggerHandle,
    interval: Duration,
    force_cycle: TriggerFlag,
    phase: CyclePhase,
}

impl HarvestScheduler {
    #[must_use]
    pub fn new(
        source: Box<dyn RecordSource>,
        aggregator: Aggregator,
        queue: BatchSender,
        counters: Arc<PipelineCounters>,
        logger: ActivityLoggerHandle,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            state: HarvestCycleState::new(aggregator),
            queue,
            counters,
            logger,
            interval,
            force_cycle: TriggerFlag::new(),
            phase: CyclePhase::Idle,
        }
    }

    /// Handle for starting a cycle ahead of schedule (e.g. SIGUSR1).
    #[must_use]
    pub fn force_trigger(&self) -> TriggerFlag {
        self.force_cycle.clone()
    }

    #[must_use]
    pub const fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Run cycles until shutdown. Returns an error only when the record
    /// source itself is gone; that error is fatal for the daemon.
    pub fn run(&mut self, shutdown: &ShutdownFlag) -> Result<()> {
        loop {
            if shutdown.is_requested() {
                break;
            }

            let cycle_started = Instant::now();
            match self.run_cycle() {
                Ok(report) => {
                    self.counters.record_cycle_completed();
                    #[allow(clippy::cast_possible_truncation)]
                    self.logger.send(ActivityEvent::CycleCompleted {
                        sequence: report.sequence,
                        records: report.records,
                        items: report.items,
                        duration_ms: cycle_started.elapsed().as_millis() as u64,
                    });
                }
                Err(e) if e.is_fatal_for_source() => {
                    self.logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("record source lost, stopping harvest: {e}"),
                    });
                    self.phase = CyclePhase::Stopped;
                    self.source.close();
                    return Err(e);
                }
                Err(e) => {
                    // Isolated failure: log, try again next period.
                    self.logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("harvest cycle failed: {e}"),
                    });
                }
            }

            self.wait_for_next_cycle(cycle_started + self.interval, shutdown);
        }

        self.phase = CyclePhase::Stopped;
        self.source.close();
        Ok(())
    }

    /// One drain→map→finalize→enqueue pass.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.phase = CyclePhase::Draining;
        let chunk = self.source.drain()?;
        if chunk.decode_errors > 0 {
            self.counters.add_decode_errors(chunk.decode_errors);
        }

        self.phase = CyclePhase::Mapping;
        for record in &chunk.records {
            self.state.aggregator.offer(record);
        }

        self.phase = CyclePhase::Finalizing;
        let sequence = self.state.take_sequence();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let batch = self.state.aggregator.finalize_cycle(sequence, now_ms);

        self.phase = CyclePhase::Enqueuing;
        let items = batch.len() as u64;
        let enqueued = if batch.is_empty() {
            // Nothing to deliver this cycle; skip the queue entirely.
            false
        } else {
            let accepted = self.queue.push(batch);
            if accepted {
                self.logger
                    .send(ActivityEvent::BatchEnqueued { sequence, items });
            }
            accepted
        };

        self.phase = CyclePhase::Idle;
        Ok(CycleReport {
            sequence,
            records: chunk.records.len() as u64,
            decode_errors: chunk.decode_errors,
            items,
            enqueued,
        })
    }

    fn wait_for_next_cycle(&self, deadline: Instant, shutdown: &ShutdownFlag) {
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() || shutdown.is_requested() || self.force_cycle.take() {
                return;
            }
            thread::sleep(remaining.min(WAIT_SLICE));
        }
    }
}
