//! Daemon assembly: wires source, mappers, aggregator, queue, worker, and
//! logger into a running harvester.
//!
//! Two long-lived loops: the harvest scheduler on the caller's thread and
//! the delivery worker on its own thread, joined only by the bounded
//! delivery queue. A small state thread snapshots counters to state.json.
//!
//! Shutdown sequencing: the scheduler stops starting cycles (finishing any
//! in-flight cycle first), then the delivery worker drains the queue up to
//! its deadline, then the logger flushes and exits.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::errors::{HarvestError, Result};
use crate::core::shutdown::{ShutdownFlag, TriggerFlag};
use crate::daemon::state::{StateSnapshot, StateWriter};
use crate::delivery::queue::delivery_queue;
use crate::delivery::sender::{JsonlFileSender, TelemetrySender};
use crate::delivery::worker::{DeliveryWorkerConfig, spawn_delivery_worker};
use crate::harvest::aggregator::Aggregator;
use crate::harvest::counters::PipelineCounters;
use crate::harvest::scheduler::{CycleReport, HarvestScheduler};
use crate::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use crate::logger::jsonl::JsonlConfig;
use crate::mapper::registry::default_registry;
use crate::record::source::RecordSource;
use crate::record::spool::{JsonChunkDecoder, SpoolDirectorySource};
use crate::telemetry::thread_name::ThreadNameNormalizer;

/// State-thread poll period.
const STATE_POLL: Duration = Duration::from_millis(250);

/// The assembled harvester daemon.
pub struct HarvesterDaemon {
    config: Config,
    counters: Arc<PipelineCounters>,
    logger_handle: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    worker_join: Option<thread::JoinHandle<()>>,
    state_join: Option<thread::JoinHandle<()>>,
    scheduler: HarvestScheduler,
    shutdown: ShutdownFlag,
    start_time: Instant,
}

impl HarvesterDaemon {
    /// Build the daemon around the default spool-directory record source.
    pub fn init_with_spool(config: Config) -> Result<Self> {
        let source = SpoolDirectorySource::new(
            config.paths.spool_dir.clone(),
            Box::new(JsonChunkDecoder),
        );
        let sender = JsonlFileSender::new(
            config.paths.output_file.clone(),
            config.delivery.max_payload_bytes,
        );
        Self::init(config, Box::new(source), Box::new(sender))
    }

    /// Build the daemon from an explicit record source and sender.
    pub fn init(
        config: Config,
        source: Box<dyn RecordSource>,
        sender: Box<dyn TelemetrySender>,
    ) -> Result<Self> {
        let start_time = Instant::now();

        // 1. Activity logger.
        let (logger_handle, logger_join) = spawn_logger(ActivityLoggerConfig {
            jsonl_config: JsonlConfig {
                path: config.paths.jsonl_log.clone(),
                fallback_path: None,
                max_size_bytes: config.logging.max_size_bytes,
                max_rotated_files: u32::try_from(config.logging.max_rotated_files).unwrap_or(5),
                fsync_interval_secs: config.logging.fsync_interval_secs,
            },
            channel_capacity: config.logging.channel_capacity,
        })?;

        // 2. Shared pipeline counters and shutdown flag.
        let counters = Arc::new(PipelineCounters::new());
        let shutdown = ShutdownFlag::new();

        // 3. Thread-name normalizer from the configured pattern.
        let normalizer = Arc::new(ThreadNameNormalizer::with_pattern(
            &config.harvest.thread_name_pattern,
        )?);

        // 4. Closed mapper registry and cycle aggregator.
        let registry = default_registry(
            Arc::clone(&counters),
            normalizer,
            &config.events.disabled,
        );
        let aggregator = Aggregator::new(registry, Arc::clone(&counters));

        // 5. Bounded delivery queue.
        let (batch_tx, batch_rx) = delivery_queue(
            config.queue.capacity,
            config.queue.policy,
            Arc::clone(&counters),
            logger_handle.clone(),
        );

        // 6. Delivery worker thread.
        let worker_join = spawn_delivery_worker(
            batch_rx,
            sender,
            DeliveryWorkerConfig::from_config(&config.delivery),
            Arc::clone(&counters),
            logger_handle.clone(),
            shutdown.clone(),
        )?;

        // 7. Harvest scheduler (runs on the caller's thread).
        let scheduler = HarvestScheduler::new(
            source,
            aggregator,
            batch_tx,
            Arc::clone(&counters),
            logger_handle.clone(),
            Duration::from_millis(config.harvest.interval_ms),
        );

        Ok(Self {
            config,
            counters,
            logger_handle,
            logger_join: Some(logger_join),
            worker_join: Some(worker_join),
            state_join: None,
            scheduler,
            shutdown,
            start_time,
        })
    }

    /// Flag other threads can use to stop the daemon.
    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Trigger for starting a harvest cycle ahead of the interval.
    #[must_use]
    pub fn force_trigger(&self) -> TriggerFlag {
        self.scheduler.force_trigger()
    }

    #[must_use]
    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    /// Run the harvest loop until shutdown or a fatal source failure.
    ///
    /// This is the main entry point for `jfrh daemon`.
    pub fn run(&mut self) -> Result<()> {
        #[cfg(feature = "daemon")]
        let _signals = crate::daemon::signals::SignalHandler::register(
            self.shutdown.clone(),
            self.scheduler.force_trigger(),
        );

        self.announce_start();
        self.spawn_state_thread()?;

        let outcome = self.scheduler.run(&self.shutdown);
        let reason = match &outcome {
            Ok(()) => "shutdown requested".to_string(),
            Err(e) => format!("fatal: {}", e.code()),
        };
        self.teardown(&reason);
        outcome
    }

    /// Run exactly one harvest cycle, drain delivery, and stop.
    ///
    /// Entry point for `jfrh once`.
    pub fn run_once(&mut self) -> Result<CycleReport> {
        self.announce_start();
        let report = self.scheduler.run_cycle();
        self.teardown("single cycle complete");
        report
    }

    fn announce_start(&self) {
        let config_hash = self.config.stable_hash().unwrap_or_default();
        self.logger_handle.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
        });
    }

    fn spawn_state_thread(&mut self) -> Result<()> {
        let mut writer = StateWriter::new(self.config.paths.state_file.clone());
        let counters = Arc::clone(&self.counters);
        let logger = self.logger_handle.clone();
        let shutdown = self.shutdown.clone();
        let start_time = self.start_time;

        let join = thread::Builder::new()
            .name("jfrh-state".to_string())
            .spawn(move || {
                while !shutdown.is_requested() {
                    let snapshot = StateSnapshot::new(
                        start_time.elapsed().as_secs(),
                        counters.snapshot(),
                        logger.dropped_events(),
                    );
                    let _ = writer.maybe_write(&snapshot);
                    thread::sleep(STATE_POLL);
                }
                // Final snapshot so post-mortem state is current.
                let snapshot = StateSnapshot::new(
                    start_time.elapsed().as_secs(),
                    counters.snapshot(),
                    logger.dropped_events(),
                );
                let _ = writer.write_now(&snapshot);
            })
            .map_err(|e| HarvestError::Runtime {
                details: format!("failed to spawn state thread: {e}"),
            })?;
        self.state_join = Some(join);
        Ok(())
    }

    fn teardown(&mut self, reason: &str) {
        self.shutdown.request();
        if let Some(join) = self.worker_join.take() {
            let _ = join.join();
        }
        if let Some(join) = self.state_join.take() {
            let _ = join.join();
        }
        self.logger_handle.send(ActivityEvent::DaemonStopped {
            reason: reason.to_string(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        });
        self.logger_handle.shutdown();
        if let Some(join) = self.logger_join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::raw::{FieldValue, RawRecord};
    use crate::record::source::ReplaySource;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.harvest.interval_ms = 10;
        config.paths.spool_dir = dir.join("spool");
        config.paths.state_file = dir.join("state.json");
        config.paths.jsonl_log = dir.join("activity.jsonl");
        config.paths.output_file = dir.join("telemetry.jsonl");
        config
    }

    #[test]
    fn run_once_delivers_one_batch_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut source = ReplaySource::new();
        source.push_chunk(vec![
            RawRecord::new("jdk.CPULoad", 100)
                .with_field("jvmUser", FieldValue::Float(0.1))
                .with_field("jvmSystem", FieldValue::Float(0.02))
                .with_field("machineTotal", FieldValue::Float(0.5)),
        ]);
        let sender = JsonlFileSender::new(dir.path().join("telemetry.jsonl"), 1_000_000);

        let mut daemon =
            HarvesterDaemon::init(config, Box::new(source), Box::new(sender)).unwrap();
        let report = daemon.run_once().unwrap();
        assert_eq!(report.sequence, 1);
        assert_eq!(report.items, 3);
        assert!(report.enqueued);

        // Batch reached the output file.
        let output = std::fs::read_to_string(dir.path().join("telemetry.jsonl")).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("jfr.CPULoad.jvmUser"));

        // Counters saw the success.
        assert_eq!(daemon.counters().snapshot().successful_batches, 1);

        // Activity log captured the lifecycle.
        let log = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        assert!(log.contains("daemon_start"));
        assert!(log.contains("batch_enqueued"));
        assert!(log.contains("daemon_stop"));
    }

    #[test]
    fn run_stops_on_external_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let sender = JsonlFileSender::new(dir.path().join("telemetry.jsonl"), 1_000_000);
        let mut daemon = HarvesterDaemon::init(
            config,
            Box::new(ReplaySource::new()),
            Box::new(sender),
        )
        .unwrap();

        let shutdown = daemon.shutdown_flag();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            shutdown.request();
        });

        daemon.run().unwrap();
        stopper.join().unwrap();

        // State file was written on the way out.
        assert!(dir.path().join("state.json").exists());
    }
}
