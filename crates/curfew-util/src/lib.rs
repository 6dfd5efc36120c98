//! Shared utilities for curfew
//!
//! This crate provides:
//! - Wall-clock types for availability windows (`WallClock`, `DaysOfWeek`, `TimeWindow`)
//! - The `Clock` seam (system clock with debug mock time, manual clock for tests)
//! - ID types (`RunId`)
//! - Default paths for the configuration file

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
