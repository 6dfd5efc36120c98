//! Workload contract for curfew
//!
//! This crate defines the interface between the supervisor and the
//! service it brings up and down. It contains no platform code itself.
//! Every Online period gets:
//! - A fresh [`Workload`] instance from a [`WorkloadFactory`]
//! - A [`WorkloadContext`] carrying the period's cancellation token
//! - A [`TaskGroup`] that the supervisor sweeps when the period ends

mod context;
mod group;
mod mock;
mod traits;

pub use context::*;
pub use group::*;
pub use mock::*;
pub use traits::*;
