//! Supervisor-owned task group
//!
//! Every task started during an Online period (the workload's run-loop,
//! the watchdog, anything the workload spawns in the background) joins
//! one group. Shutting the group down is the period's cleanup sweep.

use curfew_api::ShutdownReport;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{WorkloadError, WorkloadResult};

type TaskOutput = WorkloadResult<()>;

#[derive(Default)]
struct GroupState {
    closed: bool,
    tasks: JoinSet<TaskOutput>,
    names: HashMap<task::Id, String>,
}

struct Inner {
    token: CancellationToken,
    state: Mutex<GroupState>,
}

/// A set of tasks sharing one cancellation token.
///
/// Cloning yields another handle to the same group.
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("closed", &self.is_closed())
            .field("len", &self.len())
            .finish()
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl TaskGroup {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                state: Mutex::new(GroupState::default()),
            }),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    fn state(&self) -> MutexGuard<'_, GroupState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `future` as a member of the group.
    ///
    /// Refused once shutdown has begun.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> WorkloadResult<()>
    where
        F: Future<Output = TaskOutput> + Send + 'static,
    {
        let name = name.into();
        let mut state = self.state();
        if state.closed {
            warn!(task = %name, "Task group is shutting down; spawn refused");
            return Err(WorkloadError::GroupClosed);
        }

        let handle = state.tasks.spawn(future);
        debug!(task = %name, id = %handle.id(), "Task joined group");
        state.names.insert(handle.id(), name);
        Ok(())
    }

    /// Tasks not yet collected
    pub fn len(&self) -> usize {
        self.state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Close the group, cancel its token and wait for every member.
    ///
    /// Members still running after `grace` are aborted. Errors and panics
    /// are logged per task and never propagate.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let (mut tasks, mut names) = {
            let mut state = self.state();
            state.closed = true;
            (
                std::mem::take(&mut state.tasks),
                std::mem::take(&mut state.names),
            )
        };

        self.inner.token.cancel();
        info!(tasks = tasks.len(), "Shutting down task group");

        let mut report = ShutdownReport::default();
        let deadline = Instant::now() + grace;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(result)) => record(&mut report, &mut names, result),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = tasks.len(),
                        grace_secs = grace.as_secs(),
                        "Tasks ignored cancellation; aborting"
                    );
                    tasks.abort_all();
                    while let Some(result) = tasks.join_next_with_id().await {
                        record(&mut report, &mut names, result);
                    }
                    break;
                }
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            aborted = report.aborted,
            panicked = report.panicked,
            "Task group settled"
        );
        report
    }
}

fn record(
    report: &mut ShutdownReport,
    names: &mut HashMap<task::Id, String>,
    result: Result<(task::Id, TaskOutput), JoinError>,
) {
    let mut name_of = |id: task::Id| names.remove(&id).unwrap_or_else(|| id.to_string());

    match result {
        Ok((id, Ok(()))) => {
            debug!(task = %name_of(id), "Task finished");
            report.completed += 1;
        }
        Ok((id, Err(e))) => {
            warn!(task = %name_of(id), error = %e, "Task failed during shutdown");
            report.failed += 1;
        }
        Err(e) if e.is_cancelled() => {
            warn!(task = %name_of(e.id()), "Task aborted");
            report.aborted += 1;
        }
        Err(e) => {
            error!(task = %name_of(e.id()), error = %e, "Task panicked");
            report.panicked += 1;
        }
    }
}
