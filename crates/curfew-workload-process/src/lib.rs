//! Process-backed workload for curfew
//!
//! Provides:
//! - Command resolution against the working directory and `PATH`
//! - Process spawning with process group isolation
//! - Graceful (SIGTERM) and forceful (SIGKILL) termination on cancellation
//! - Exit observation

mod process;
mod workload;

pub use process::*;
pub use workload::*;
