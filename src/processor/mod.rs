//! Bounded parallel processing of retrieved documents.
//!
//! # Concurrency Model
//!
//! - Documents are split into chunks; chunks run strictly one after another
//! - Within a chunk each document runs in its own Tokio task on a `JoinSet`
//! - A shared semaphore bounds concurrently running operations to `max_workers`
//! - Each task checks memory headroom first and is skipped, not queued, when short
//! - Panics, timeouts and operation errors are caught per task; siblings keep running
//!
//! # Retry Behavior
//!
//! After all chunks, failed documents are re-run serially for up to
//! `max_retries` passes, with `base * 2^pass` sleeps before every pass after
//! the first.
//!
//! # Cancellation
//!
//! [`ParallelProcessor::cancel_all`] stops the run in progress. Running tasks
//! are detached and their results discarded; everything still outstanding is
//! reported as [`FailureReason::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use regfetch_core::processor::{NoProgress, ParallelProcessor, ProcessorConfig, operation_fn};
//! use regfetch_core::registry::Document;
//!
//! # async fn example(documents: Vec<Document>) -> Result<(), Box<dyn std::error::Error>> {
//! let processor = ParallelProcessor::new(ProcessorConfig::default())?;
//! let word_counts = operation_fn(|document: Document| async move {
//!     Ok::<_, std::convert::Infallible>(document.content.split_whitespace().count())
//! });
//! let report = processor.process_all(documents, word_counts, &NoProgress).await;
//! println!("{} processed, {} failed", report.results.len(), report.failures.len());
//! # Ok(())
//! # }
//! ```

mod operation;
mod progress;
mod stats;

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use operation::{DocumentOperation, FnOperation, operation_fn};
pub use progress::{NoProgress, ProgressDetails, ProgressPhase, ProgressSink, ProgressUpdate};
pub use stats::ProcessingStats;

use crate::monitor::{MonitorConfig, ResourceMonitor, ResourceSnapshot};
use crate::registry::Document;

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 100;

/// Default worker count.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default documents per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Default per-task timeout (5 minutes).
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Memory a task needs free before it runs.
pub const DEFAULT_TASK_MEMORY_MB: u64 = 50;

/// Memory that should be free between chunks.
pub const DEFAULT_CHUNK_HEADROOM_MB: u64 = 100;

/// Pause taken between chunks when headroom is short.
pub const DEFAULT_LOW_MEMORY_PAUSE: Duration = Duration::from_secs(1);

/// Default number of serial retry passes.
pub const DEFAULT_TASK_RETRIES: u32 = 3;

/// Base of the retry-pass backoff.
pub const DEFAULT_RETRY_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Error type for processor construction.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between 1 and 100")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Invalid chunk size provided.
    #[error("invalid chunk size {value}: must be at least 1")]
    InvalidChunkSize {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorConfig {
    /// Operations allowed to run at once, `1..=100`.
    pub max_workers: usize,
    /// Documents per chunk, at least 1.
    pub chunk_size: usize,
    /// Time allowed for one invocation.
    pub task_timeout: Duration,
    /// Memory ceiling handed to the resource monitor.
    pub memory_limit_mb: u64,
    /// Free memory each invocation requires.
    pub task_memory_mb: u64,
    /// Free memory wanted between chunks.
    pub chunk_headroom_mb: u64,
    /// Pause between chunks when headroom is short.
    pub low_memory_pause: Duration,
    /// Sample memory and CPU during runs.
    pub enable_monitoring: bool,
    /// Re-run failed documents after the chunks finish.
    pub retry_failed_tasks: bool,
    /// Serial retry passes.
    pub max_retries: u32,
    /// Base of the `base * 2^pass` retry-pass backoff.
    pub retry_backoff_base: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            memory_limit_mb: crate::monitor::DEFAULT_MEMORY_LIMIT_MB,
            task_memory_mb: DEFAULT_TASK_MEMORY_MB,
            chunk_headroom_mb: DEFAULT_CHUNK_HEADROOM_MB,
            low_memory_pause: DEFAULT_LOW_MEMORY_PAUSE,
            enable_monitoring: true,
            retry_failed_tasks: true,
            max_retries: DEFAULT_TASK_RETRIES,
            retry_backoff_base: DEFAULT_RETRY_BACKOFF_BASE,
        }
    }
}

impl ProcessorConfig {
    /// Checks worker count and chunk size.
    ///
    /// # Errors
    ///
    /// [`ProcessorError::InvalidWorkers`] outside `1..=100`,
    /// [`ProcessorError::InvalidChunkSize`] for zero.
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.max_workers) {
            return Err(ProcessorError::InvalidWorkers {
                value: self.max_workers,
            });
        }
        if self.chunk_size == 0 {
            return Err(ProcessorError::InvalidChunkSize {
                value: self.chunk_size,
            });
        }
        Ok(())
    }

    /// Monitor settings derived from this configuration.
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            memory_limit_mb: self.memory_limit_mb,
            ..MonitorConfig::default()
        }
    }
}

/// Why a document ended up in the failure list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum FailureReason {
    /// Skipped because memory headroom was short.
    InsufficientMemory,
    /// The operation returned an error.
    Operation(String),
    /// The operation exceeded the task timeout.
    TimedOut,
    /// The operation panicked.
    Panicked(String),
    /// The run was cancelled before the document finished.
    Cancelled,
}

impl FailureReason {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientMemory => write!(f, "insufficient memory"),
            Self::Operation(message) => write!(f, "operation failed: {message}"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Panicked(message) => write!(f, "panicked: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A document the operation succeeded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedDocument<T> {
    /// Position in the submitted list.
    pub index: usize,
    /// Document identifier.
    pub identifier: String,
    /// Operation output.
    pub output: T,
    /// Invocations used, including retries.
    pub attempts: u32,
}

/// A document that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    /// Position in the submitted list.
    pub index: usize,
    /// The document itself.
    pub document: Document,
    /// Last failure.
    pub reason: FailureReason,
    /// Invocations attempted, including retries.
    pub attempts: u32,
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    /// Documents submitted.
    pub total: usize,
    /// Documents with a result.
    pub completed: usize,
    /// Documents that failed for a reason other than cancellation.
    pub failed: usize,
    /// Documents reported as cancelled.
    pub cancelled: usize,
    /// Retry invocations made.
    pub retried: usize,
    /// Invocations skipped for memory.
    pub skipped_for_memory: usize,
    /// Invocations that finished or were skipped, across all passes.
    pub invocations: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Resource snapshot, when monitoring was on.
    pub resources: Option<ResourceSnapshot>,
}

/// Everything a run produced. Results and failures are sorted by index.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport<T> {
    /// Successful documents.
    pub results: Vec<ProcessedDocument<T>>,
    /// Failed documents.
    pub failures: Vec<FailedDocument>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Run counters.
    pub summary: ProcessingSummary,
}

/// Configuration plus live resource figures.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    /// Processor configuration.
    pub config: ProcessorConfig,
    /// Whether the monitor is sampling right now.
    pub monitoring_active: bool,
    /// Current resource snapshot, when a monitor exists.
    pub resources: Option<ResourceSnapshot>,
    /// Operations running right now.
    pub active_tasks: usize,
}

#[derive(Debug, Clone, Copy)]
struct TaskLimits {
    timeout: Duration,
    memory_mb: u64,
}

/// Mutable bookkeeping owned by the coordinating task.
struct RunState<T> {
    total: usize,
    done: usize,
    results: Vec<ProcessedDocument<T>>,
    failures: BTreeMap<usize, (FailureReason, u32)>,
    stats: ProcessingStats,
}

impl<T> RunState<T> {
    fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            results: Vec::with_capacity(total),
            failures: BTreeMap::new(),
            stats: ProcessingStats::new(),
        }
    }

    fn count_failure(&self, reason: &FailureReason) {
        match reason {
            FailureReason::InsufficientMemory => self.stats.increment_skipped_memory(),
            FailureReason::Cancelled => {}
            _ => self.stats.increment_failed(),
        }
    }

    fn record<P: ProgressSink + ?Sized>(
        &mut self,
        index: usize,
        document: &Document,
        result: Result<T, FailureReason>,
        attempts: u32,
        phase: ProgressPhase,
        progress: &P,
    ) {
        if phase == ProgressPhase::Initial {
            self.done += 1;
        }

        let succeeded = result.is_ok();
        match result {
            Ok(output) => {
                self.stats.increment_completed();
                self.failures.remove(&index);
                self.results.push(ProcessedDocument {
                    index,
                    identifier: document.identifier.clone(),
                    output,
                    attempts,
                });
            }
            Err(reason) => {
                self.count_failure(&reason);
                debug!(
                    index,
                    identifier = %document.identifier,
                    attempts,
                    %reason,
                    "document failed"
                );
                self.failures.insert(index, (reason, attempts));
            }
        }

        let verb = if succeeded { "processed" } else { "failed" };
        progress.on_progress(&ProgressUpdate {
            current: self.done,
            total: self.total,
            message: format!("{verb} {}", document.identifier),
            details: Some(ProgressDetails {
                index,
                identifier: document.identifier.clone(),
                succeeded,
                phase,
            }),
        });
    }

    fn cancel(&mut self, indices: impl IntoIterator<Item = usize>) {
        for index in indices {
            let attempts = self.failures.get(&index).map_or(0, |(_, attempts)| *attempts);
            self.failures.insert(index, (FailureReason::Cancelled, attempts));
        }
    }
}

/// Bounded parallel processor.
///
/// Uses a semaphore to limit concurrently running operations and an optional
/// [`ResourceMonitor`] to skip work when memory is short.
#[derive(Debug)]
pub struct ParallelProcessor {
    config: ProcessorConfig,
    semaphore: Arc<Semaphore>,
    monitor: Option<Arc<ResourceMonitor>>,
    cancel: Mutex<CancellationToken>,
    active_tasks: Arc<AtomicUsize>,
}

impl ParallelProcessor {
    /// Creates a processor; when monitoring is enabled it samples the current
    /// process with `sysinfo`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if the configuration is invalid.
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorError> {
        let monitor_config = config.monitor_config();
        Self::with_monitor_config(config, monitor_config)
    }

    /// Like [`ParallelProcessor::new`] with explicit sampling settings.
    ///
    /// The monitor's memory limit is taken from `monitor_config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if the configuration is invalid.
    #[instrument(level = "debug", skip_all, fields(workers = config.max_workers))]
    pub fn with_monitor_config(
        config: ProcessorConfig,
        monitor_config: MonitorConfig,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;
        let monitor = if config.enable_monitoring {
            match ResourceMonitor::for_current_process(monitor_config) {
                Ok(monitor) => Some(monitor),
                Err(e) => {
                    warn!(error = %e, "resource monitoring unavailable, running unmonitored");
                    None
                }
            }
        } else {
            None
        };
        Ok(Self::build(config, monitor))
    }

    /// Creates a processor with a caller-supplied monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if the configuration is invalid.
    pub fn with_monitor(
        config: ProcessorConfig,
        monitor: ResourceMonitor,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;
        Ok(Self::build(config, Some(monitor)))
    }

    fn build(config: ProcessorConfig, monitor: Option<ResourceMonitor>) -> Self {
        debug!(
            workers = config.max_workers,
            chunk_size = config.chunk_size,
            monitoring = monitor.is_some(),
            "creating processor"
        );
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
            monitor: monitor.map(Arc::new),
            cancel: Mutex::new(CancellationToken::new()),
            active_tasks: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Cancels the run in progress.
    pub fn cancel_all(&self) {
        info!("cancelling processing run");
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Configuration plus the current resource snapshot.
    #[must_use]
    pub fn performance_stats(&self) -> PerformanceStats {
        PerformanceStats {
            config: self.config.clone(),
            monitoring_active: self
                .monitor
                .as_ref()
                .is_some_and(|monitor| monitor.is_running()),
            resources: self.monitor.as_ref().map(|monitor| monitor.snapshot()),
            active_tasks: self.active_tasks.load(Ordering::SeqCst),
        }
    }

    /// Hands out the token for a new run, replacing a spent one.
    fn begin_run(&self) -> CancellationToken {
        let mut token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn task_limits(&self) -> TaskLimits {
        TaskLimits {
            timeout: self.config.task_timeout,
            memory_mb: self.config.task_memory_mb,
        }
    }

    /// Runs `operation` over every document.
    ///
    /// Never fails as a whole: each document ends up either in
    /// `results` or in `failures`.
    #[instrument(skip_all, fields(documents = documents.len(), workers = self.config.max_workers))]
    pub async fn process_all<O, P>(
        &self,
        documents: Vec<Document>,
        operation: O,
        progress: &P,
    ) -> ProcessingReport<O::Output>
    where
        O: DocumentOperation + 'static,
        P: ProgressSink + ?Sized,
    {
        let started = Instant::now();
        let token = self.begin_run();
        let operation = Arc::new(operation);
        let documents: Vec<Arc<Document>> = documents.into_iter().map(Arc::new).collect();
        let total = documents.len();
        let mut run = RunState::new(total);

        if let Some(monitor) = &self.monitor {
            monitor.start();
        }
        info!(total, chunk_size = self.config.chunk_size, "starting processing run");

        for chunk_start in (0..total).step_by(self.config.chunk_size) {
            if token.is_cancelled() {
                run.cancel(chunk_start..total);
                break;
            }
            let chunk_end = (chunk_start + self.config.chunk_size).min(total);
            debug!(chunk_start, chunk_end, "processing chunk");
            self.run_chunk(&documents, chunk_start..chunk_end, &operation, &token, &mut run, progress)
                .await;

            if chunk_end < total && !token.is_cancelled() {
                self.pause_if_memory_low(&token).await;
            }
        }

        if self.config.retry_failed_tasks && !token.is_cancelled() {
            self.retry_failures(&documents, &operation, &token, &mut run, progress)
                .await;
        }

        let cancelled = token.is_cancelled();
        if let Some(monitor) = &self.monitor {
            monitor.stop().await;
        }
        let resources = self.monitor.as_ref().map(|monitor| monitor.snapshot());

        Self::finish(documents, run, cancelled, started.elapsed(), resources)
    }

    async fn run_chunk<O, P>(
        &self,
        documents: &[Arc<Document>],
        range: Range<usize>,
        operation: &Arc<O>,
        token: &CancellationToken,
        run: &mut RunState<O::Output>,
        progress: &P,
    ) where
        O: DocumentOperation + 'static,
        P: ProgressSink + ?Sized,
    {
        let mut join_set = JoinSet::new();
        let mut outstanding: HashSet<usize> = range.clone().collect();

        for index in range {
            let document = Arc::clone(&documents[index]);
            let operation = Arc::clone(operation);
            let semaphore = Arc::clone(&self.semaphore);
            let monitor = self.monitor.clone();
            let token = token.clone();
            let active = Arc::clone(&self.active_tasks);
            let limits = self.task_limits();

            join_set.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let permit = tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, Err(FailureReason::Cancelled));
                };
                if token.is_cancelled() {
                    return (index, Err(FailureReason::Cancelled));
                }
                let result =
                    invoke(operation.as_ref(), &document, monitor.as_deref(), limits, &active).await;
                (index, result)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(detached = join_set.len(), "cancelled, detaching running tasks");
                    join_set.detach_all();
                    break;
                }
                joined = join_set.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((index, result))) => {
                    outstanding.remove(&index);
                    run.record(index, &documents[index], result, 1, ProgressPhase::Initial, progress);
                }
                Some(Err(e)) => warn!(error = %e, "processing task failed to join"),
            }
        }

        if token.is_cancelled() {
            run.cancel(outstanding);
        } else {
            for index in outstanding {
                let reason = FailureReason::Panicked("task did not complete".to_string());
                run.count_failure(&reason);
                run.failures.insert(index, (reason, 1));
            }
        }
    }

    async fn pause_if_memory_low(&self, token: &CancellationToken) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        if monitor.is_available(self.config.chunk_headroom_mb) {
            return;
        }
        warn!(
            headroom_mb = self.config.chunk_headroom_mb,
            pause_ms = self.config.low_memory_pause.as_millis(),
            "memory headroom low between chunks, pausing"
        );
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(self.config.low_memory_pause) => {}
        }
    }

    async fn retry_failures<O, P>(
        &self,
        documents: &[Arc<Document>],
        operation: &Arc<O>,
        token: &CancellationToken,
        run: &mut RunState<O::Output>,
        progress: &P,
    ) where
        O: DocumentOperation + 'static,
        P: ProgressSink + ?Sized,
    {
        for pass in 0..self.config.max_retries {
            let pending: Vec<usize> = run
                .failures
                .iter()
                .filter(|(_, (reason, _))| reason.is_retryable())
                .map(|(index, _)| *index)
                .collect();
            if pending.is_empty() {
                break;
            }

            if pass > 0 {
                let delay = retry_pass_delay(self.config.retry_backoff_base, pass);
                debug!(pass, delay_ms = delay.as_millis(), "waiting before retry pass");
                tokio::select! {
                    () = token.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }

            info!(pass = pass + 1, pending = pending.len(), "retrying failed documents");
            for index in pending {
                let attempts = run.failures.get(&index).map_or(0, |(_, attempts)| *attempts) + 1;
                run.stats.increment_retried();

                let document = Arc::clone(&documents[index]);
                let operation = Arc::clone(operation);
                let monitor = self.monitor.clone();
                let active = Arc::clone(&self.active_tasks);
                let limits = self.task_limits();
                let mut handle = tokio::spawn(async move {
                    invoke(operation.as_ref(), &document, monitor.as_deref(), limits, &active).await
                });

                let result = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        // Dropping the handle detaches the task; it finishes unobserved
                        debug!(index, "cancelled during retry pass, detaching task");
                        drop(handle);
                        run.cancel([index]);
                        return;
                    }
                    joined = &mut handle => joined.unwrap_or_else(|e| {
                        warn!(error = %e, "retry task failed to join");
                        Err(FailureReason::Panicked("task did not complete".to_string()))
                    }),
                };
                run.record(
                    index,
                    &documents[index],
                    result,
                    attempts,
                    ProgressPhase::Retry { pass: pass + 1 },
                    progress,
                );
            }
        }
    }

    fn finish<T>(
        documents: Vec<Arc<Document>>,
        run: RunState<T>,
        cancelled: bool,
        elapsed: Duration,
        resources: Option<ResourceSnapshot>,
    ) -> ProcessingReport<T> {
        let RunState {
            total,
            mut results,
            failures,
            stats,
            ..
        } = run;
        results.sort_by_key(|result| result.index);

        let mut slots: Vec<Option<Arc<Document>>> = documents.into_iter().map(Some).collect();
        let failures: Vec<FailedDocument> = failures
            .into_iter()
            .filter_map(|(index, (reason, attempts))| {
                let document = slots.get_mut(index)?.take()?;
                Some(FailedDocument {
                    index,
                    document: Arc::try_unwrap(document).unwrap_or_else(|shared| (*shared).clone()),
                    reason,
                    attempts,
                })
            })
            .collect();

        let cancelled_count = failures
            .iter()
            .filter(|failure| failure.reason == FailureReason::Cancelled)
            .count();
        let summary = ProcessingSummary {
            total,
            completed: results.len(),
            failed: failures.len() - cancelled_count,
            cancelled: cancelled_count,
            retried: stats.retried(),
            skipped_for_memory: stats.skipped_memory(),
            invocations: stats.total(),
            elapsed,
            resources,
        };

        info!(
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            retried = summary.retried,
            skipped_for_memory = summary.skipped_for_memory,
            invocations = summary.invocations,
            failed_invocations = stats.failed(),
            elapsed_ms = elapsed.as_millis(),
            "processing run complete"
        );

        ProcessingReport {
            results,
            failures,
            cancelled,
            summary,
        }
    }
}

/// Sleep before retry pass `pass` (0-based): `base * 2^pass`.
fn retry_pass_delay(base: Duration, pass: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(pass))
}

/// Counts one running operation until dropped.
struct ActiveTask<'a>(&'a AtomicUsize);

impl<'a> ActiveTask<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveTask<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs one invocation with the memory check, timeout and panic isolation.
async fn invoke<O: DocumentOperation>(
    operation: &O,
    document: &Document,
    monitor: Option<&ResourceMonitor>,
    limits: TaskLimits,
    active: &AtomicUsize,
) -> Result<O::Output, FailureReason> {
    if let Some(monitor) = monitor {
        if !monitor.is_available(limits.memory_mb) {
            warn!(
                identifier = %document.identifier,
                required_mb = limits.memory_mb,
                "skipping document, insufficient memory"
            );
            return Err(FailureReason::InsufficientMemory);
        }
    }

    let _active = ActiveTask::enter(active);
    let outcome = tokio::time::timeout(
        limits.timeout,
        AssertUnwindSafe(operation.process(document)).catch_unwind(),
    )
    .await;

    match outcome {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(e))) => Err(FailureReason::Operation(e.to_string())),
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            warn!(identifier = %document.identifier, %message, "operation panicked");
            Err(FailureReason::Panicked(message))
        }
        Err(_) => {
            warn!(
                identifier = %document.identifier,
                timeout_ms = limits.timeout.as_millis(),
                "operation timed out"
            );
            Err(FailureReason::TimedOut)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
