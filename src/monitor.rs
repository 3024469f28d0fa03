//! Background sampling of process memory and CPU.
//!
//! A [`ResourceMonitor`] runs a sampling loop on a tokio task while started,
//! keeping peak values and warning counters in one [`ResourceSnapshot`]
//! behind a single lock. The processor consults [`ResourceMonitor::is_available`]
//! before each task; while the loop runs that check reads the latest reading
//! instead of sampling, and it fails open when sampling is impossible.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default sampling interval (1 second).
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Default memory ceiling in megabytes.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 1024;

/// Default CPU warning ceiling in percent.
pub const DEFAULT_CPU_CEILING_PERCENT: f32 = 90.0;

/// Multiplier applied to the interval after a failed sample.
const FAILURE_BACKOFF_FACTOR: u32 = 5;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Errors raised while sampling the current process.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The current process id could not be determined.
    #[error("cannot determine current process: {0}")]
    NoCurrentProcess(String),

    /// The process disappeared from the system table.
    #[error("process {pid} not found in system table")]
    ProcessNotFound {
        /// Process id that was looked up.
        pid: String,
    },
}

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorConfig {
    /// Delay between samples.
    pub interval: Duration,
    /// Memory ceiling; exceeding it counts a warning and fails availability checks.
    pub memory_limit_mb: u64,
    /// CPU percentage above which a warning is counted.
    pub cpu_ceiling_percent: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SAMPLE_INTERVAL,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            cpu_ceiling_percent: DEFAULT_CPU_CEILING_PERCENT,
        }
    }
}

/// One reading of the current process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Resident memory in megabytes.
    pub memory_mb: f64,
    /// CPU usage in percent.
    pub cpu_percent: f32,
}

/// Source of process readings.
pub trait ResourceSampler: Send {
    /// Takes a reading of the current process.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] when the process cannot be observed.
    fn sample(&mut self) -> Result<ResourceSample, MonitorError>;
}

/// [`ResourceSampler`] backed by `sysinfo`.
pub struct SysinfoSampler {
    system: System,
    pid: sysinfo::Pid,
}

impl SysinfoSampler {
    /// Creates a sampler for the current process.
    ///
    /// # Errors
    ///
    /// [`MonitorError::NoCurrentProcess`] if the platform cannot report our pid.
    pub fn new() -> Result<Self, MonitorError> {
        let pid =
            sysinfo::get_current_pid().map_err(|e| MonitorError::NoCurrentProcess(e.to_string()))?;
        let mut sampler = Self {
            system: System::new(),
            pid,
        };
        sampler.refresh();
        Ok(sampler)
    }

    /// Refreshes memory and CPU for this process only.
    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory().with_cpu(),
        );
    }
}

impl ResourceSampler for SysinfoSampler {
    #[allow(clippy::cast_precision_loss)]
    fn sample(&mut self) -> Result<ResourceSample, MonitorError> {
        self.refresh();
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| MonitorError::ProcessNotFound {
                pid: self.pid.to_string(),
            })?;
        Ok(ResourceSample {
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
            cpu_percent: process.cpu_usage(),
        })
    }
}

/// Peak and last-seen resource values plus warning counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    /// Highest memory seen, MB.
    pub peak_memory_mb: f64,
    /// Highest CPU seen, percent.
    pub peak_cpu_percent: f32,
    /// Most recent memory reading, MB.
    pub last_memory_mb: f64,
    /// Most recent CPU reading, percent.
    pub last_cpu_percent: f32,
    /// Samples over the memory limit.
    pub memory_warnings: u64,
    /// Samples over the CPU ceiling.
    pub cpu_warnings: u64,
    /// Successful samples.
    pub samples: u64,
    /// Failed samples.
    pub sample_failures: u64,
}

impl ResourceSnapshot {
    fn record(&mut self, sample: ResourceSample, config: &MonitorConfig) {
        self.samples += 1;
        self.last_memory_mb = sample.memory_mb;
        self.last_cpu_percent = sample.cpu_percent;
        self.peak_memory_mb = self.peak_memory_mb.max(sample.memory_mb);
        self.peak_cpu_percent = self.peak_cpu_percent.max(sample.cpu_percent);

        #[allow(clippy::cast_precision_loss)]
        let limit = config.memory_limit_mb as f64;
        if sample.memory_mb > limit {
            self.memory_warnings += 1;
            warn!(
                memory_mb = sample.memory_mb,
                limit_mb = config.memory_limit_mb,
                "memory usage above limit"
            );
        }
        if sample.cpu_percent > config.cpu_ceiling_percent {
            self.cpu_warnings += 1;
            warn!(
                cpu_percent = sample.cpu_percent,
                ceiling = config.cpu_ceiling_percent,
                "high CPU usage"
            );
        }
    }
}

type SharedSampler = Arc<Mutex<Box<dyn ResourceSampler>>>;

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background resource monitor.
pub struct ResourceMonitor {
    config: MonitorConfig,
    sampler: SharedSampler,
    snapshot: Arc<Mutex<ResourceSnapshot>>,
    running: Mutex<Option<RunningLoop>>,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ResourceMonitor {
    /// Creates a monitor using the given sampler.
    #[must_use]
    pub fn new(config: MonitorConfig, sampler: Box<dyn ResourceSampler>) -> Self {
        Self {
            config,
            sampler: Arc::new(Mutex::new(sampler)),
            snapshot: Arc::new(Mutex::new(ResourceSnapshot::default())),
            running: Mutex::new(None),
        }
    }

    /// Creates a monitor for the current process using `sysinfo`.
    ///
    /// # Errors
    ///
    /// See [`SysinfoSampler::new`].
    pub fn for_current_process(config: MonitorConfig) -> Result<Self, MonitorError> {
        Ok(Self::new(config, Box::new(SysinfoSampler::new()?)))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Starts the sampling loop. Calling it while running does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
        {
            debug!("resource monitor already running");
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            self.config.clone(),
            Arc::clone(&self.sampler),
            Arc::clone(&self.snapshot),
            token.clone(),
        ));
        info!(
            interval_ms = self.config.interval.as_millis(),
            memory_limit_mb = self.config.memory_limit_mb,
            "resource monitor started"
        );
        *running = Some(RunningLoop { token, handle });
    }

    /// Stops the sampling loop and waits for it to exit. Idempotent.
    pub async fn stop(&self) {
        let active = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(active) = active else {
            return;
        };
        active.token.cancel();
        if let Err(e) = active.handle.await {
            warn!(error = %e, "resource monitor task ended abnormally");
        }
        info!("resource monitor stopped");
    }

    /// True while the sampling loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ResourceSnapshot {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if `required_mb` more megabytes fit under the memory limit.
    ///
    /// While the sampling loop runs this reads its latest reading; otherwise
    /// it samples once. Returns `true` when the process cannot be sampled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_available(&self, required_mb: u64) -> bool {
        let memory_mb = match self.latest_memory_mb() {
            Some(memory_mb) => memory_mb,
            None => {
                let reading = self
                    .sampler
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .sample();
                match reading {
                    Ok(sample) => sample.memory_mb,
                    Err(e) => {
                        debug!(error = %e, "availability check could not sample; assuming available");
                        return true;
                    }
                }
            }
        };
        memory_mb + required_mb as f64 <= self.config.memory_limit_mb as f64
    }

    /// Last memory reading from the running loop, if it has taken one.
    fn latest_memory_mb(&self) -> Option<f64> {
        if !self.is_running() {
            return None;
        }
        let snapshot = self.snapshot();
        (snapshot.samples > 0).then_some(snapshot.last_memory_mb)
    }
}

/// Takes one sample and folds it into the snapshot.
fn sample_once(
    sampler: &SharedSampler,
    snapshot: &Mutex<ResourceSnapshot>,
    config: &MonitorConfig,
) -> Result<(), MonitorError> {
    let reading = sampler
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .sample();
    let mut snapshot = snapshot.lock().unwrap_or_else(PoisonError::into_inner);
    match reading {
        Ok(sample) => {
            snapshot.record(sample, config);
            Ok(())
        }
        Err(e) => {
            snapshot.sample_failures += 1;
            Err(e)
        }
    }
}

async fn sampling_loop(
    config: MonitorConfig,
    sampler: SharedSampler,
    snapshot: Arc<Mutex<ResourceSnapshot>>,
    token: CancellationToken,
) {
    loop {
        let wait = match sample_once(&sampler, &snapshot, &config) {
            Ok(()) => config.interval,
            Err(e) => {
                warn!(error = %e, "resource sampling failed");
                config.interval * FAILURE_BACKOFF_FACTOR
            }
        };

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }
    }
}
