//! Worker loop driving a stage against a host.
//!
//! The host decides scheduling: a worker just calls
//! [`RecordTransformStage::process`] repeatedly, sleeping after empty polls.

use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::codec::Codec;
use crate::host::HostSession;
use crate::stage::RecordTransformStage;
use crate::transform_registry::Transform;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Sleep after a poll that found no record
    pub poll_interval: Duration,
    /// Return as soon as a poll finds no record
    pub stop_when_idle: bool,
    /// Number of workers started by [`run_pool`]
    pub threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stop_when_idle: false,
            threads: 1,
        }
    }
}

impl WorkerConfig {
    /// Drain the queue once and stop.
    pub fn drain(threads: usize) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            stop_when_idle: true,
            threads,
        }
    }
}

/// Counters collected by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub commit_errors: usize,
    pub idle_polls: usize,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.commit_errors += other.commit_errors;
        self.idle_polls += other.idle_polls;
    }
}

/// Process records until `shutdown` is set (or until idle, see
/// [`WorkerConfig::stop_when_idle`]).
pub fn run_worker<T, C, H>(
    stage: &RecordTransformStage<T, C>,
    host: &H,
    config: &WorkerConfig,
    shutdown: &AtomicBool,
) -> WorkerStats
where
    T: Transform,
    C: Codec,
    H: HostSession,
{
    let mut stats = WorkerStats::default();

    while !shutdown.load(Ordering::Relaxed) {
        match stage.process(host) {
            Some(attempt) => {
                stats.processed += 1;
                if attempt.succeeded() {
                    stats.succeeded += 1;
                } else {
                    stats.failed += 1;
                }
                if attempt.commit_error.is_some() {
                    stats.commit_errors += 1;
                }
            }
            None => {
                stats.idle_polls += 1;
                tracing::trace!("No record available");
                if config.stop_when_idle {
                    break;
                }
                if !config.poll_interval.is_zero() {
                    thread::sleep(config.poll_interval);
                }
            }
        }
    }

    stats
}

/// Run `config.threads` workers over one shared stage and host.
///
/// Blocks until every worker returns, then merges their stats.
pub fn run_pool<T, C, H>(
    stage: &RecordTransformStage<T, C>,
    host: &H,
    config: &WorkerConfig,
    shutdown: &AtomicBool,
) -> WorkerStats
where
    T: Transform,
    C: Codec,
    H: HostSession,
{
    let threads = config.threads.max(1);
    tracing::info!("Starting {} worker(s)", threads);

    let mut total = WorkerStats::default();
    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| scope.spawn(|| run_worker(stage, host, config, shutdown)))
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(stats) => total += stats,
                Err(_) => tracing::error!("Worker thread panicked"),
            }
        }
    });

    tracing::info!(
        "Workers stopped: {} processed, {} succeeded, {} failed",
        total.processed,
        total.succeeded,
        total.failed
    );
    total
}
