//! Availability scheduler and lifecycle supervisor for curfew
//!
//! This crate is the heart of curfewd, containing:
//! - Window evaluation (is the service allowed to be online right now)
//! - The supervisor state machine (Offline -> Starting -> Online -> ShuttingDown -> Offline)
//! - The watchdog raced against the workload's run-loop
//! - Graceful sweep of every task started during an Online period

mod scheduler;
mod supervisor;
mod watchdog;

pub use scheduler::*;
pub use supervisor::*;
pub use watchdog::*;
