use crate::error::CycleError;
use crate::pipeline::{CycleSuccess, ForecastPipeline};
use crate::trigger::{ScheduledJob, TriggerSource};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// What became of a request to run a cycle.
#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(Result<CycleSuccess, CycleError>),
    /// A cycle was already running; the request was dropped.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    /// The schedule is armed and waiting for its next firing.
    pub running: bool,
    pub cycle_in_progress: bool,
    pub scheduled_jobs: Vec<ScheduledJob>,
    pub triggers_dropped: u64,
}

struct Inner {
    pipeline: Arc<ForecastPipeline>,
    // Held for the whole duration of a cycle. Only ever acquired with
    // `try_lock`, so a busy worker drops requests instead of queueing them.
    guard: Arc<Mutex<()>>,
    armed: AtomicBool,
    job: RwLock<Option<ScheduledJob>>,
    dropped: AtomicU64,
}

/// Runs forecast cycles one at a time, from the daily trigger, the startup
/// smoke test and on-demand requests alike.
#[derive(Clone)]
pub struct ForecastScheduler {
    inner: Arc<Inner>,
}

impl ForecastScheduler {
    pub fn new(pipeline: Arc<ForecastPipeline>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                guard: Arc::new(Mutex::new(())),
                armed: AtomicBool::new(false),
                job: RwLock::new(None),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn pipeline(&self) -> &Arc<ForecastPipeline> {
        &self.inner.pipeline
    }

    pub fn is_cycle_in_progress(&self) -> bool {
        self.inner.guard.try_lock().is_err()
    }

    /// Runs a cycle on the current task, unless one is already running.
    pub async fn run_now(&self) -> TriggerOutcome {
        let Ok(_running) = self.inner.guard.try_lock() else {
            self.record_drop();
            return TriggerOutcome::Skipped;
        };
        TriggerOutcome::Completed(self.inner.pipeline.run_cycle().await)
    }

    /// Starts a cycle in the background, unless one is already running.
    /// Returns `None` when the request was dropped.
    pub fn spawn_cycle(&self) -> Option<JoinHandle<Result<CycleSuccess, CycleError>>> {
        let Ok(running) = self.inner.guard.clone().try_lock_owned() else {
            self.record_drop();
            return None;
        };
        let pipeline = Arc::clone(&self.inner.pipeline);
        Some(tokio::spawn(async move {
            let _running = running;
            pipeline.run_cycle().await
        }))
    }

    /// Waits until no cycle is running.
    pub async fn wait_idle(&self) {
        let _idle = self.inner.guard.lock().await;
    }

    /// Optionally runs the startup smoke test, then fires a cycle each time
    /// `trigger` does until it is exhausted. A cycle still running when the
    /// trigger ends is awaited.
    pub async fn run(&self, mut trigger: Box<dyn TriggerSource>, startup_smoke_test: bool) {
        if startup_smoke_test {
            tracing::info!("[STARTUP] Running startup smoke test cycle.");
            // Spawned, so cancelling this loop never interrupts the cycle itself.
            match self.spawn_cycle() {
                Some(handle) => match handle.await {
                    Ok(Ok(success)) => {
                        tracing::info!(snapshot = %success.snapshot, "[STARTUP] Smoke test passed.");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "[STARTUP] Smoke test failed; arming the schedule anyway.");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "[STARTUP] Smoke test task did not complete.");
                    }
                },
                None => {
                    tracing::info!("[STARTUP] A cycle was already running; smoke test skipped.");
                }
            }
        }

        self.inner.armed.store(true, Ordering::SeqCst);
        let mut in_flight = None;

        loop {
            let job = trigger.job();
            tracing::info!(
                job = %job.id,
                next_run_time = ?job.next_run_time,
                "[SCHEDULER] Waiting for next trigger."
            );
            *self.inner.job.write().await = Some(job);

            let Some(fired_at) = trigger.next_fire().await else {
                break;
            };
            tracing::info!(%fired_at, "[SCHEDULER] Trigger fired.");
            match self.spawn_cycle() {
                Some(handle) => in_flight = Some(handle),
                None => tracing::info!("[SCHEDULER] Cycle already running; trigger dropped."),
            }
        }

        self.inner.armed.store(false, Ordering::SeqCst);
        *self.inner.job.write().await = None;
        tracing::info!("[SCHEDULER] Trigger source exhausted; schedule disarmed.");

        if let Some(handle) = in_flight {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "[SCHEDULER] Cycle task did not complete.");
            }
        }
    }

    pub async fn get_status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.inner.armed.load(Ordering::SeqCst),
            cycle_in_progress: self.is_cycle_in_progress(),
            scheduled_jobs: self.inner.job.read().await.iter().cloned().collect(),
            triggers_dropped: self.inner.dropped.load(Ordering::SeqCst),
        }
    }

    fn record_drop(&self) {
        self.inner.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
