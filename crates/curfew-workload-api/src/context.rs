//! Per-period workload context

use curfew_util::RunId;
use tokio_util::sync::CancellationToken;

use crate::TaskGroup;

/// Handed to the workload for one Online period
#[derive(Debug, Clone)]
pub struct WorkloadContext {
    run_id: RunId,
    group: TaskGroup,
}

impl WorkloadContext {
    pub fn new(run_id: RunId, group: TaskGroup) -> Self {
        Self { run_id, group }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Cancelled when the period shuts down
    pub fn token(&self) -> &CancellationToken {
        self.group.token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.group.token().is_cancelled()
    }

    /// Resolves once the period starts shutting down
    pub async fn cancelled(&self) {
        self.group.token().cancelled().await
    }

    /// Group for the workload's own background tasks
    pub fn group(&self) -> &TaskGroup {
        &self.group
    }
}
