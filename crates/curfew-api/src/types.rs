//! Shared types for the curfew API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the supervisor.
///
/// Owned by the supervisor; transitions happen only on poll-cycle
/// boundaries or when a raced task completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    #[default]
    Offline,
    Starting,
    Online,
    ShuttingDown,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Online => "online",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// Why an Online period ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ShutdownReason {
    /// The workload's run-loop returned on its own
    WorkloadCompleted,
    /// The workload's run-loop returned an error or panicked
    WorkloadFailed { error: String },
    /// The watchdog saw the allowed window close
    WindowClosed,
    /// Operator interrupt
    Interrupted,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkloadCompleted => f.write_str("workload completed"),
            Self::WorkloadFailed { error } => write!(f, "workload failed: {}", error),
            Self::WindowClosed => f.write_str("window closed"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Outcome counts from sweeping a task group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Tasks that returned `Ok` (on their own or after observing cancellation)
    pub completed: usize,
    /// Tasks that returned an error
    pub failed: usize,
    /// Tasks aborted after the grace period expired
    pub aborted: usize,
    /// Tasks that panicked
    pub panicked: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.aborted + self.panicked
    }

    /// True when every task settled without an error, panic or forced abort
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.aborted == 0 && self.panicked == 0
    }
}

/// The two legal documents guarded by the consent gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Eula,
    Privacy,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Eula, DocumentKind::Privacy];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Eula => "EULA",
            Self::Privacy => "privacy policy",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
