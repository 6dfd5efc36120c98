//! Lifecycle supervisor

use curfew_api::{Event, EventPayload, ShutdownReason, ShutdownReport, SupervisorState};
use curfew_config::ServiceConfig;
use curfew_util::{Clock, RunId, format_datetime_full, format_duration};
use curfew_workload_api::{
    TaskGroup, Workload, WorkloadContext, WorkloadFactory, WorkloadResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{AvailabilityScheduler, Watchdog};

/// Supervisor cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Offline poll cadence, also the pause after every Online period
    pub poll_interval: Duration,
    pub watchdog_initial_delay: Duration,
    pub watchdog_interval: Duration,
    /// Cooperative-cancellation grace before tasks are aborted
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for SupervisorConfig {
    fn from(service: &ServiceConfig) -> Self {
        Self {
            poll_interval: service.poll_interval,
            watchdog_initial_delay: service.watchdog_initial_delay,
            watchdog_interval: service.watchdog_interval,
            shutdown_grace: service.shutdown_grace,
        }
    }
}

/// How a period ended, before the sweep
enum PeriodEnd {
    /// `create` or `initialize` failed; never went Online
    StartFailed(String),
    Ended(ShutdownReason),
}

/// Brings the workload up while the window is open and down when it closes
pub struct Supervisor {
    config: SupervisorConfig,
    scheduler: Arc<AvailabilityScheduler>,
    clock: Arc<dyn Clock>,
    factory: Arc<dyn WorkloadFactory>,
    state: SupervisorState,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        scheduler: AvailabilityScheduler,
        clock: Arc<dyn Clock>,
        factory: Arc<dyn WorkloadFactory>,
    ) -> Self {
        info!(
            windows = scheduler.windows().len(),
            poll_secs = config.poll_interval.as_secs(),
            "Supervisor initialized"
        );

        Self {
            config,
            scheduler: Arc::new(scheduler),
            clock,
            factory,
            state: SupervisorState::Offline,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Receive every event from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, payload: EventPayload) {
        let event = Event::new(self.clock.now(), payload);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn transition(&mut self, to: SupervisorState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(from = %from, to = %to, "State changed");
        self.emit(EventPayload::StateChanged { from, to });
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Cancelling while Online still performs the full shutdown sweep
    /// before returning.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Supervisor started");

        while !shutdown.is_cancelled() {
            let now = self.clock.now();
            let allowed = self.scheduler.is_allowed(&now);
            self.emit(EventPayload::WindowChecked { allowed });

            if allowed {
                self.run_period(&shutdown).await;
            } else {
                info!(time = %format_datetime_full(&now), "Outside allowed window; staying offline");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(state = %self.state, "Supervisor stopped");
    }

    /// One Starting -> Online -> ShuttingDown -> Offline cycle.
    ///
    /// Always returns in Offline; nothing the workload does escapes.
    async fn run_period(&mut self, shutdown: &CancellationToken) {
        let run_id = RunId::new();
        self.transition(SupervisorState::Starting);
        info!(run_id = %run_id, "Starting workload");

        let group = TaskGroup::new(CancellationToken::new());
        let end = self.start_and_race(run_id, &group, shutdown).await;

        match end {
            PeriodEnd::StartFailed(error) => {
                error!(run_id = %run_id, error = %error, "Workload failed to start; staying offline");
                let report = group.shutdown(self.config.shutdown_grace).await;
                if report.total() > 0 {
                    info!(run_id = %run_id, tasks = report.total(), "Swept tasks left by failed start");
                }
                self.emit(EventPayload::StartFailed { run_id, error });
            }
            PeriodEnd::Ended(reason) => {
                self.transition(SupervisorState::ShuttingDown);
                match &reason {
                    ShutdownReason::WorkloadFailed { error } => {
                        warn!(run_id = %run_id, error = %error, "Workload failed; shutting down")
                    }
                    reason => info!(run_id = %run_id, reason = %reason, "Shutting down"),
                }

                let report = group.shutdown(self.config.shutdown_grace).await;
                log_report(run_id, &report);
                self.emit(EventPayload::PeriodEnded {
                    run_id,
                    reason,
                    report,
                });
            }
        }

        self.transition(SupervisorState::Offline);
    }

    async fn start_and_race(
        &mut self,
        run_id: RunId,
        group: &TaskGroup,
        shutdown: &CancellationToken,
    ) -> PeriodEnd {
        let workload = match self.factory.create(run_id) {
            Ok(workload) => workload,
            Err(e) => return PeriodEnd::StartFailed(e.to_string()),
        };

        let ctx = WorkloadContext::new(run_id, group.clone());
        let (init_tx, init_rx) = oneshot::channel();
        let (run_tx, run_rx) = oneshot::channel();

        let task_name = format!("workload:{}", workload.name());
        if let Err(e) = group.spawn(task_name, drive_workload(workload, ctx, init_tx, run_tx)) {
            return PeriodEnd::StartFailed(e.to_string());
        }

        let initialized = tokio::select! {
            result = init_rx => result,
            _ = shutdown.cancelled() => return PeriodEnd::Ended(ShutdownReason::Interrupted),
        };
        match initialized {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return PeriodEnd::StartFailed(e.to_string()),
            Err(_) => return PeriodEnd::StartFailed("initialize panicked".into()),
        }

        self.transition(SupervisorState::Online);
        let now = self.clock.now();
        match self.scheduler.remaining_in_window(&now) {
            Some(remaining) => info!(
                run_id = %run_id,
                remaining = %format_duration(remaining),
                "Workload online"
            ),
            None => info!(run_id = %run_id, "Workload online"),
        }

        let (closed_tx, closed_rx) = oneshot::channel();
        let watchdog = Watchdog::new(
            self.scheduler.clone(),
            self.clock.clone(),
            self.config.watchdog_initial_delay,
            self.config.watchdog_interval,
        );
        let token = group.token().clone();
        if let Err(e) = group.spawn("watchdog", async move {
            watchdog.run(token, closed_tx).await;
            Ok(())
        }) {
            return PeriodEnd::Ended(ShutdownReason::WorkloadFailed {
                error: e.to_string(),
            });
        }

        // First to finish wins; the sweep cancels the loser
        let reason = tokio::select! {
            result = run_rx => match result {
                Ok(Ok(())) => ShutdownReason::WorkloadCompleted,
                Ok(Err(e)) => ShutdownReason::WorkloadFailed { error: e.to_string() },
                Err(_) => ShutdownReason::WorkloadFailed { error: "run panicked".into() },
            },
            result = closed_rx => {
                if result.is_err() {
                    error!(run_id = %run_id, "Watchdog stopped unexpectedly; treating window as closed");
                }
                ShutdownReason::WindowClosed
            }
            _ = shutdown.cancelled() => ShutdownReason::Interrupted,
        };

        PeriodEnd::Ended(reason)
    }
}

/// Body of the workload task: initialize, report, then run and report.
///
/// Outcomes travel over the channels so the task itself only fails on
/// panic, which the group contains.
async fn drive_workload(
    mut workload: Box<dyn Workload>,
    ctx: WorkloadContext,
    init_tx: oneshot::Sender<WorkloadResult<()>>,
    run_tx: oneshot::Sender<WorkloadResult<()>>,
) -> WorkloadResult<()> {
    let initialized = workload.initialize(&ctx).await;
    let ready = initialized.is_ok();
    let _ = init_tx.send(initialized);
    if !ready {
        return Ok(());
    }

    let result = workload.run(&ctx).await;
    if let Err(e) = &result
        && ctx.is_cancelled()
    {
        warn!(run_id = %ctx.run_id(), error = %e, "Workload errored while stopping");
    }
    let _ = run_tx.send(result);
    Ok(())
}

fn log_report(run_id: RunId, report: &ShutdownReport) {
    if report.is_clean() {
        info!(run_id = %run_id, tasks = report.total(), "Shutdown complete");
    } else {
        warn!(
            run_id = %run_id,
            completed = report.completed,
            failed = report.failed,
            aborted = report.aborted,
            panicked = report.panicked,
            "Shutdown complete with errors"
        );
    }
}
