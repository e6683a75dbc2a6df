use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::executor::ProbeExecutor;
use super::types::{CheckResult, CheckStatus};
use crate::database::models::Monitor;
use crate::database::repository::{MonitorRegistry, ResultSink};

/// Errors from scheduler lifecycle misuse or a failing registry
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is not running")]
    NotRunning,
    #[error("monitor registry unavailable: {0:#}")]
    Registry(anyhow::Error),
}

/// Outcome of a single dispatched check
#[derive(Debug)]
pub enum CheckOutcome {
    /// The probe ran and its result went to the sink
    Completed(CheckResult),
    /// The monitor is gone or disabled, nothing ran
    Skipped,
}

/// Counters exposed through the status surface
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_checks: u64,
    pub errors: u64,
    pub last_check: Option<String>,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub scheduled_count: usize,
    pub stats: StatsSnapshot,
}

/// Active monitor set grouped for quick inspection
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub total_monitors: usize,
    pub by_interval: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

/// Changes applied by a reconcile pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

#[derive(Debug, Default)]
struct SchedulerStats {
    total_checks: AtomicU64,
    errors: AtomicU64,
    last_check_epoch: AtomicU64,
}

impl SchedulerStats {
    fn record_dispatch(&self) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        self.last_check_epoch.store(now, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        let epoch = self.last_check_epoch.load(Ordering::Relaxed);
        let last_check = (epoch != 0)
            .then(|| chrono::DateTime::from_timestamp(epoch as i64, 0))
            .flatten()
            .map(|timestamp| timestamp.to_rfc3339());

        StatsSnapshot {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_check,
        }
    }
}

/// A live periodic timer for one monitor
struct ScheduleEntry {
    interval_seconds: u64,
    handle: JoinHandle<()>,
}

/// Coordinates periodic execution of every active monitor.
///
/// One timer task per monitor; each tick re-reads the definition from the
/// registry, runs the probe, and hands the result to the sink. Checks for
/// the same monitor never overlap, checks for different monitors run
/// independently.
pub struct CheckScheduler {
    registry: Arc<dyn MonitorRegistry>,
    sink: Arc<dyn ResultSink>,
    executor: Arc<ProbeExecutor>,
    entries: Mutex<HashMap<Uuid, ScheduleEntry>>,
    running: AtomicBool,
    stats: Arc<SchedulerStats>,
}

impl CheckScheduler {
    pub fn new(
        registry: Arc<dyn MonitorRegistry>,
        sink: Arc<dyn ResultSink>,
        executor: Arc<ProbeExecutor>,
    ) -> Self {
        Self {
            registry,
            sink,
            executor,
            entries: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// Load every active monitor and start a timer for each.
    ///
    /// Returns how many monitors were scheduled.
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let monitors = match self.registry.find_all_active().await {
            Ok(monitors) => monitors,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(SchedulerError::Registry(e));
            }
        };

        let mut entries = self.entries.lock().await;
        for monitor in &monitors {
            if let Some(previous) = entries.insert(monitor.uuid, self.spawn_entry(monitor)) {
                previous.handle.abort();
            }
        }
        let count = entries.len();
        drop(entries);

        info!("Scheduler started with {} monitors", count);
        Ok(count)
    }

    /// Cancel every timer and wait for the timer tasks to wind down.
    ///
    /// No new check is dispatched after this returns; checks already in
    /// flight finish on their own and still reach the sink. Returns how
    /// many timers were cancelled.
    pub async fn stop(&self) -> Result<usize, SchedulerError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        let mut entries = self.entries.lock().await;
        let drained: Vec<ScheduleEntry> = entries.drain().map(|(_, entry)| entry).collect();
        drop(entries);

        let count = drained.len();
        for entry in drained {
            entry.handle.abort();
            let _ = entry.handle.await;
        }

        info!("Scheduler stopped, {} timers cancelled", count);
        Ok(count)
    }

    /// Stop and start again, picking up the current registry contents
    pub async fn restart(&self) -> Result<usize, SchedulerError> {
        self.stop().await?;
        self.start().await
    }

    /// Create or replace the timer for one monitor.
    ///
    /// A disabled monitor is unscheduled instead. The swap happens under
    /// the entries lock, so there is never a moment with two timers for
    /// the same monitor.
    pub async fn schedule_monitor(&self, monitor: &Monitor) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        let mut entries = self.entries.lock().await;
        // stop() flips the flag before draining under this lock, so it may
        // have finished while we waited for it; inserting now would leave a
        // live timer on a stopped scheduler
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        if let Some(previous) = entries.remove(&monitor.uuid) {
            previous.handle.abort();
        }
        if monitor.enabled {
            let entry = self.spawn_entry(monitor);
            debug!("Scheduled monitor {} every {}s", monitor.uuid, entry.interval_seconds);
            entries.insert(monitor.uuid, entry);
        }

        Ok(())
    }

    /// Cancel the timer for one monitor.
    ///
    /// Returns whether a timer existed. A check already in flight is not
    /// interrupted.
    pub async fn unschedule_monitor(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(&id) {
            Some(entry) => {
                entry.handle.abort();
                debug!("Unscheduled monitor {}", id);
                true
            }
            None => false,
        }
    }

    /// Run one check immediately, outside any timer.
    ///
    /// The monitor is re-read from the registry first; if it is gone or
    /// disabled the check is skipped and nothing is recorded.
    pub async fn run_monitor_check(&self, id: Uuid) -> Result<CheckOutcome, SchedulerError> {
        run_scheduled_check(id, &self.registry, &self.executor, &self.sink, &self.stats).await
    }

    /// Current lifecycle state and counters
    pub async fn get_status(&self) -> SchedulerStatus {
        let scheduled_count = self.entries.lock().await.len();
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            scheduled_count,
            stats: self.stats.snapshot(),
        }
    }

    /// Summarize the active monitor set as the registry sees it
    pub async fn scheduled_jobs(&self) -> Result<ScheduleSummary, SchedulerError> {
        let monitors = self.registry.find_all_active().await.map_err(SchedulerError::Registry)?;

        let mut by_interval: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for monitor in &monitors {
            *by_interval.entry(format!("{}s", monitor.interval_seconds)).or_default() += 1;
            *by_type.entry(monitor.check_type.to_string()).or_default() += 1;
        }

        Ok(ScheduleSummary { total_monitors: monitors.len(), by_interval, by_type })
    }

    /// Bring the running timers in line with the registry.
    ///
    /// Monitors that appeared are scheduled, monitors that vanished or
    /// were disabled are unscheduled, and monitors whose interval changed
    /// get a fresh timer.
    pub async fn reconcile(&self) -> Result<ReconcileReport, SchedulerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        let monitors = self.registry.find_all_active().await.map_err(SchedulerError::Registry)?;
        let mut report = ReconcileReport::default();
        let mut entries = self.entries.lock().await;
        // Same window as schedule_monitor: a concurrent stop() may have
        // drained the map while the registry read was in flight
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        let active: HashMap<Uuid, &Monitor> =
            monitors.iter().map(|monitor| (monitor.uuid, monitor)).collect();
        let stale: Vec<Uuid> =
            entries.keys().filter(|id| !active.contains_key(id)).copied().collect();
        for id in stale {
            if let Some(entry) = entries.remove(&id) {
                entry.handle.abort();
                report.removed += 1;
            }
        }

        for monitor in &monitors {
            match entries.get(&monitor.uuid) {
                Some(entry) if entry.interval_seconds == monitor.interval_seconds.max(1) => {}
                Some(_) => {
                    if let Some(previous) = entries.remove(&monitor.uuid) {
                        previous.handle.abort();
                    }
                    entries.insert(monitor.uuid, self.spawn_entry(monitor));
                    report.updated += 1;
                }
                None => {
                    entries.insert(monitor.uuid, self.spawn_entry(monitor));
                    report.added += 1;
                }
            }
        }

        if report.added + report.removed + report.updated > 0 {
            info!(
                "Reconciled schedule: {} added, {} removed, {} updated",
                report.added, report.removed, report.updated
            );
        }

        Ok(report)
    }

    fn spawn_entry(&self, monitor: &Monitor) -> ScheduleEntry {
        let interval_seconds = monitor.interval_seconds.max(1);
        let id = monitor.uuid;
        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(interval_seconds));
            // A slow check pushes the next tick out instead of bursting,
            // so two dispatches are always at least an interval apart
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                // The probe runs in its own task so aborting this timer
                // never cancels a check in flight
                let registry = Arc::clone(&registry);
                let executor = Arc::clone(&executor);
                let sink = Arc::clone(&sink);
                let task_stats = Arc::clone(&stats);
                let check = tokio::spawn(async move {
                    if let Err(e) =
                        run_scheduled_check(id, &registry, &executor, &sink, &task_stats).await
                    {
                        task_stats.record_error();
                        error!("Scheduled check for monitor {} failed: {}", id, e);
                    }
                });

                // A panicking check is contained here; the timer stays up
                if let Err(e) = check.await {
                    if e.is_panic() {
                        stats.record_error();
                        warn!("Check task for monitor {} panicked: {}", id, e);
                    }
                }
            }
        });

        ScheduleEntry { interval_seconds, handle }
    }
}

async fn run_scheduled_check(
    id: Uuid,
    registry: &Arc<dyn MonitorRegistry>,
    executor: &Arc<ProbeExecutor>,
    sink: &Arc<dyn ResultSink>,
    stats: &Arc<SchedulerStats>,
) -> Result<CheckOutcome, SchedulerError> {
    // Re-read the definition so deletes and edits take effect immediately
    let monitor = match registry.find_by_id(id).await.map_err(SchedulerError::Registry)? {
        Some(monitor) if monitor.enabled => monitor,
        _ => {
            debug!("Skipping check for monitor {}: removed or disabled", id);
            return Ok(CheckOutcome::Skipped);
        }
    };

    stats.record_dispatch();

    let result = executor.execute_check(&monitor).await;
    if result.status == CheckStatus::Error {
        stats.record_error();
    }

    info!(
        monitor = %monitor.uuid,
        name = %monitor.name,
        status = %result.status,
        response_time_ms = result.response_time_ms,
        "Check completed"
    );

    // A sink failure loses this one result but never takes the timer down
    if let Err(e) = sink.record(&result).await {
        error!("Failed to record result for monitor {}: {:#}", monitor.uuid, e);
    }

    Ok(CheckOutcome::Completed(result))
}
