//! Shared vocabulary for curfew
//!
//! This crate defines the types passed between the supervisor, the consent
//! gate and the daemon:
//! - Supervisor states and shutdown reasons
//! - Shutdown reports from the task-group sweep
//! - Events (supervisor -> observers)
//! - Consent document kinds

mod events;
mod types;

pub use events::*;
pub use types::*;

/// Current event schema version
pub const API_VERSION: u32 = 1;
