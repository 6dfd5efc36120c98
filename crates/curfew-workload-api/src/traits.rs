//! Workload traits

use async_trait::async_trait;
use curfew_util::RunId;
use thiserror::Error;

use crate::WorkloadContext;

/// Errors from workload operations
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Workload exited: {0}")]
    Exited(String),

    #[error("Task group is closed")]
    GroupClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// The supervised service.
///
/// `run` is long-running and must return promptly once the context's
/// token is cancelled. Background work belongs in the context's task
/// group so the supervisor can sweep it.
#[async_trait]
pub trait Workload: Send {
    fn name(&self) -> &str;

    /// One-time setup before going Online. Failing here keeps the
    /// supervisor Offline until the next poll.
    async fn initialize(&mut self, ctx: &WorkloadContext) -> WorkloadResult<()>;

    /// Main run-loop
    async fn run(&mut self, ctx: &WorkloadContext) -> WorkloadResult<()>;
}

/// Builds a fresh workload for every Online period
pub trait WorkloadFactory: Send + Sync {
    fn create(&self, run_id: RunId) -> WorkloadResult<Box<dyn Workload>>;
}
