//! Scheduler and reconfiguration controller.
//!
//! Owns at most one sync timer, one hunter timer and the sweeper timer.
//! Settings are re-read on every poll tick and whenever the settings store
//! signals a change; a changed [`WorkerConfig`] replaces both job timers,
//! stopping disabled ones and restarting enabled ones with an immediate run.
//! A run already in progress is never interrupted: its replacement starts
//! after it completes.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use eziarr_core::{defaults, Error, Result, WorkerConfig};

use crate::hunter::{hunt, HuntOutcome};
use crate::sweeper::{SweepReport, Sweeper};
use crate::sync::{sync_missing, SyncReport};
use crate::JobContext;

/// Process-level scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// How often settings are re-read.
    pub poll_interval: Duration,
    /// How often the downloads root is swept.
    pub sweep_interval: Duration,
    /// Downloads root swept by the housekeeping timer.
    pub download_dir: PathBuf,
    /// Age after which downloads are deleted.
    pub retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(defaults::SETTINGS_POLL_INTERVAL_SECS),
            sweep_interval: Duration::from_secs(defaults::SWEEP_INTERVAL_SECS),
            download_dir: PathBuf::from(defaults::DOWNLOAD_DIR),
            retention: Duration::from_secs(defaults::DOWNLOAD_RETENTION_SECS),
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable background jobs |
    /// | `SETTINGS_POLL_INTERVAL_SECS` | `10` | Settings re-read period |
    /// | `SWEEP_INTERVAL_SECS` | `3600` | Downloads sweep period |
    /// | `DOWNLOAD_DIR` | `downloads` | Downloads root |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let secs = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
                .max(1)
        };

        Self {
            enabled,
            poll_interval: Duration::from_secs(secs(
                "SETTINGS_POLL_INTERVAL_SECS",
                defaults::SETTINGS_POLL_INTERVAL_SECS,
            )),
            sweep_interval: Duration::from_secs(secs(
                "SWEEP_INTERVAL_SECS",
                defaults::SWEEP_INTERVAL_SECS,
            )),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::DOWNLOAD_DIR)),
            retention: Duration::from_secs(defaults::DOWNLOAD_RETENTION_SECS),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Scheduler started.
    Started,
    /// Job timers were rebuilt for a new configuration.
    Reconfigured { config: WorkerConfig },
    /// A sync pass finished.
    SyncCompleted { report: SyncReport },
    /// A hunter run finished.
    HuntCompleted { outcome: HuntOutcome },
    /// A downloads sweep finished.
    SweepCompleted { report: SweepReport },
    /// Scheduler stopped; every timer it owned is gone.
    Stopped,
}

/// A recurring task that can be replaced or stopped. Stopping never
/// interrupts a run in progress; the task exits before its next tick.
#[derive(Default)]
pub struct TimerSlot {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Run `job` every `period`, the first time immediately, in place of the
    /// current task. The new task waits for the old one's in-flight run.
    pub fn start<F, Fut>(&mut self, period: Duration, job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let previous = self.signal_stop();
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop = Some(stop_tx);
        self.handle = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            run_periodic(period, stop_rx, job).await;
        }));
    }

    /// Stop after the current run, if any. Idempotent.
    pub fn cancel(&mut self) {
        self.signal_stop();
    }

    /// Stop and wait until the task has exited.
    pub async fn drain(&mut self) {
        if let Some(handle) = self.signal_stop() {
            let _ = handle.await;
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn signal_stop(&mut self) -> Option<JoinHandle<()>> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.take()
    }
}

/// Tick loop behind [`TimerSlot`]. Overlong runs delay the following tick
/// instead of bunching up; a dropped sender counts as a stop.
async fn run_periodic<F, Fut>(period: Duration, mut stop: oneshot::Receiver<()>, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }
        job().await;
    }
}

/// Keeps the sync and hunter timers in line with the current [`WorkerConfig`].
pub struct Reconfigurator {
    ctx: JobContext,
    event_tx: broadcast::Sender<SchedulerEvent>,
    current: Option<WorkerConfig>,
    sync: TimerSlot,
    hunter: TimerSlot,
}

impl Reconfigurator {
    pub fn new(ctx: JobContext, event_tx: broadcast::Sender<SchedulerEvent>) -> Self {
        Self {
            ctx,
            event_tx,
            current: None,
            sync: TimerSlot::default(),
            hunter: TimerSlot::default(),
        }
    }

    /// Last applied configuration.
    pub fn current(&self) -> Option<WorkerConfig> {
        self.current
    }

    pub fn sync_active(&self) -> bool {
        self.sync.is_active()
    }

    pub fn hunter_active(&self) -> bool {
        self.hunter.is_active()
    }

    /// Re-read settings and apply them. A settings read failure keeps the
    /// running timers.
    pub async fn refresh(&mut self) -> bool {
        match self.ctx.settings.all().await {
            Ok(settings) => self.apply(WorkerConfig::from_settings(&settings)),
            Err(e) => {
                warn!(subsystem = "jobs", component = "scheduler", error = %e, "Failed to read settings");
                false
            }
        }
    }

    /// Apply `config`. Returns whether the timers were rebuilt.
    pub fn apply(&mut self, config: WorkerConfig) -> bool {
        if self.current == Some(config) {
            return false;
        }

        info!(
            subsystem = "jobs",
            component = "scheduler",
            sync_enabled = config.sync_enabled,
            sync_interval_min = config.sync_interval,
            hunter_enabled = config.hunter_enabled,
            hunter_interval_min = config.hunter_interval,
            "Reconfiguring timers"
        );

        if config.sync_enabled {
            let ctx = self.ctx.clone();
            let tx = self.event_tx.clone();
            self.sync.start(config.sync_period(), move || {
                let ctx = ctx.clone();
                let tx = tx.clone();
                async move {
                    let report = sync_missing(&ctx).await;
                    let _ = tx.send(SchedulerEvent::SyncCompleted { report });
                }
            });
        } else {
            self.sync.cancel();
            info!(subsystem = "jobs", component = "scheduler", "Sync is disabled in settings");
        }

        if config.hunter_enabled {
            let ctx = self.ctx.clone();
            let tx = self.event_tx.clone();
            self.hunter.start(config.hunter_period(), move || {
                let ctx = ctx.clone();
                let tx = tx.clone();
                async move {
                    let outcome = hunt(&ctx).await;
                    let _ = tx.send(SchedulerEvent::HuntCompleted { outcome });
                }
            });
        } else {
            self.hunter.cancel();
            info!(subsystem = "jobs", component = "scheduler", "Hunter is disabled in settings");
        }

        self.current = Some(config);
        let _ = self.event_tx.send(SchedulerEvent::Reconfigured { config });
        true
    }

    /// Stop both timers; runs in progress finish in the background.
    pub fn stop(&mut self) {
        self.sync.cancel();
        self.hunter.cancel();
    }

    /// Stop both timers and wait for runs in progress.
    pub async fn drain(&mut self) {
        self.sync.drain().await;
        self.hunter.drain().await;
    }
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait until every timer is torn down.
    pub async fn shutdown(self) -> Result<()> {
        // A closed channel means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Scheduler task failed: {e}")))
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Drives sync, hunter and sweeper from the settings store.
pub struct Scheduler {
    ctx: JobContext,
    config: SchedulerConfig,
    settings_changed: Option<Arc<Notify>>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    pub fn new(ctx: JobContext, config: SchedulerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_CHANNEL_CAPACITY);
        Self {
            ctx,
            config,
            settings_changed: None,
            event_tx,
        }
    }

    /// Re-read settings as soon as `notify` fires, not only on the poll tick.
    pub fn with_change_notify(mut self, notify: Arc<Notify>) -> Self {
        self.settings_changed = Some(notify);
        self
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        SchedulerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip_all)]
    async fn run(self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Scheduler is disabled, not starting");
            return;
        }

        info!(
            subsystem = "jobs",
            component = "scheduler",
            poll_interval_secs = self.config.poll_interval.as_secs(),
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            download_dir = %self.config.download_dir.display(),
            "Scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::Started);

        let mut timers = Reconfigurator::new(self.ctx.clone(), self.event_tx.clone());

        let mut sweeper_slot = TimerSlot::default();
        let sweeper = Sweeper::new(self.config.download_dir.clone()).with_retention(self.config.retention);
        let tx = self.event_tx.clone();
        sweeper_slot.start(self.config.sweep_interval, move || {
            let sweeper = sweeper.clone();
            let tx = tx.clone();
            async move {
                let report = sweeper.sweep().await;
                let _ = tx.send(SchedulerEvent::SweepCompleted { report });
            }
        });

        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
                _ = poll.tick() => {}
                _ = settings_changed(self.settings_changed.as_deref()) => {
                    debug!(subsystem = "jobs", component = "scheduler", "Settings change signalled");
                }
            }
            timers.refresh().await;
        }

        timers.drain().await;
        sweeper_slot.drain().await;
        let _ = self.event_tx.send(SchedulerEvent::Stopped);
        info!("Scheduler stopped");
    }
}

async fn settings_changed(notify: Option<&Notify>) {
    match notify {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}
