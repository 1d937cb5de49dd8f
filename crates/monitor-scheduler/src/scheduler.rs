//! Monitor lifecycle: `Stopped -> Running -> Stopped`

use crate::clock::{Clock, SystemClock};
use crate::sweep::SweepReport;
use alerting::{BreachKey, BreachState, BreachTracker, TrackerConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{AlertStore, ConfigStore, DeviceDirectory, SensorSource};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between periodic sweeps (seconds)
    pub tick_interval_secs: u64,
    /// Upper bound for any single store call (milliseconds)
    pub call_timeout_ms: u64,
}

/// Shortest accepted tick interval
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted tick interval (one week)
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);

fn clamp_tick_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        clamp_tick_interval(Duration::from_secs(self.tick_interval_secs))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            call_timeout_ms: 5_000,
        }
    }
}

/// External stores the monitor reads from and writes to
#[derive(Clone)]
pub struct Collaborators {
    pub sensors: Arc<dyn SensorSource>,
    pub configs: Arc<dyn ConfigStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub devices: Arc<dyn DeviceDirectory>,
}

impl Collaborators {
    /// Use one store for every collaborator
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: SensorSource + ConfigStore + AlertStore + DeviceDirectory + 'static,
    {
        Self {
            sensors: store.clone(),
            configs: store.clone(),
            alerts: store.clone(),
            devices: store,
        }
    }
}

/// Handle of the periodic driver task
struct RunHandle {
    cancel: CancellationToken,
    tick_interval: Duration,
}

pub(crate) struct Inner {
    pub(crate) stores: Collaborators,
    pub(crate) config: MonitorConfig,
    pub(crate) clock: Arc<dyn Clock>,
    /// Held for the whole of a sweep, which serializes sweeps
    pub(crate) tracker: Mutex<BreachTracker>,
    run: Mutex<Option<RunHandle>>,
    running: AtomicBool,
}

/// Threshold monitor
///
/// Cheap to clone; clones share the same breach map and driver.
#[derive(Clone)]
pub struct ThresholdMonitor {
    inner: Arc<Inner>,
}

impl ThresholdMonitor {
    /// Create a stopped monitor using the system clock
    pub fn new(stores: Collaborators, config: MonitorConfig, tracker: TrackerConfig) -> Self {
        Self::with_clock(stores, config, tracker, Arc::new(SystemClock))
    }

    /// Create a stopped monitor with an explicit clock
    pub fn with_clock(
        stores: Collaborators,
        config: MonitorConfig,
        tracker: TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            tick_interval_secs = config.tick_interval_secs,
            call_timeout_ms = config.call_timeout_ms,
            "Threshold monitor created"
        );
        Self {
            inner: Arc::new(Inner {
                stores,
                config,
                clock,
                tracker: Mutex::new(BreachTracker::new(tracker)),
                run: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Start periodic sweeps.
    ///
    /// Runs one sweep before returning so a restart does not wait a full
    /// interval. The interval is clamped to
    /// [`MIN_TICK_INTERVAL`]..=[`MAX_TICK_INTERVAL`]. Returns `false` if the
    /// monitor was already running.
    pub async fn start(&self, tick_interval: Duration) -> bool {
        let tick_interval = clamp_tick_interval(tick_interval);

        // Registered before the first sweep so `stop` can cancel it
        let cancel = {
            let mut run = self.inner.run.lock().await;
            if run.is_some() {
                info!("Threshold monitor is already running");
                return false;
            }

            let cancel = CancellationToken::new();
            *run = Some(RunHandle {
                cancel: cancel.clone(),
                tick_interval,
            });
            self.inner.running.store(true, Ordering::SeqCst);
            cancel
        };

        info!(
            tick_interval_secs = tick_interval.as_secs(),
            "Threshold monitor started"
        );

        self.sweep_with(&cancel).await;

        if cancel.is_cancelled() {
            info!("Threshold monitor stopped during its first sweep");
        } else {
            tokio::spawn(Inner::drive(self.inner.clone(), tick_interval, cancel));
        }
        true
    }

    /// Stop periodic sweeps.
    ///
    /// A sweep in flight stops at the next sensor boundary; no new sweep is
    /// scheduled. Returns `false` if the monitor was not running.
    pub async fn stop(&self) -> bool {
        let mut run = self.inner.run.lock().await;
        let Some(handle) = run.take() else {
            return false;
        };

        handle.cancel.cancel();
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Threshold monitor stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Interval of the active driver, `None` when stopped
    pub async fn tick_interval(&self) -> Option<Duration> {
        self.inner.run.lock().await.as_ref().map(|h| h.tick_interval)
    }

    /// Run one full sweep now, waiting for any sweep in progress
    pub async fn run_sweep_once(&self) -> SweepReport {
        self.sweep_with(&CancellationToken::new()).await
    }

    pub(crate) async fn sweep_with(&self, cancel: &CancellationToken) -> SweepReport {
        let mut tracker = self.inner.tracker.lock().await;
        self.inner.sweep(&mut tracker, cancel).await
    }

    /// Snapshot of the breach map
    pub async fn breaches(&self) -> Vec<(BreachKey, BreachState)> {
        self.inner
            .tracker
            .lock()
            .await
            .states()
            .map(|(key, state)| (*key, state.clone()))
            .collect()
    }
}

impl Inner {
    /// Periodic driver; never overlaps sweeps
    async fn drive(inner: Arc<Inner>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Monitor driver shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match inner.tracker.try_lock() {
                        Ok(mut tracker) => {
                            inner.sweep(&mut tracker, &cancel).await;
                        }
                        Err(_) => {
                            debug!("Sweep already in progress, skipping tick");
                        }
                    }
                }
            }
        }
    }
}
