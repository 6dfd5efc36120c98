//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Supervisor cadence and bootstrap settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Consent documents
    #[serde(default)]
    pub consent: RawConsentConfig,

    /// Allowed windows. Absent means the built-in schedule; an explicit
    /// empty list means the workload never runs.
    #[serde(default)]
    pub schedule: Option<Vec<RawTimeWindow>>,

    /// The supervised command
    pub workload: RawWorkload,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Offline poll cadence (default 60)
    pub poll_interval_seconds: Option<u64>,

    /// Delay before the watchdog's first window check (default 10)
    pub watchdog_initial_delay_seconds: Option<u64>,

    /// Watchdog re-check cadence (default 60)
    pub watchdog_interval_seconds: Option<u64>,

    /// Cooperative cancellation grace before tasks are aborted (default 10)
    pub shutdown_grace_seconds: Option<u64>,

    /// Environment file loaded at startup. Must exist when set.
    pub env_file: Option<PathBuf>,
}

/// Consent document settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConsentConfig {
    pub eula: Option<RawDocument>,
    pub privacy: Option<RawDocument>,
}

/// One consent document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDocument {
    /// Live document text
    pub document: Option<PathBuf>,

    /// Acceptance marker holding the accepted hash
    pub marker: Option<PathBuf>,

    /// Environment variable whose value, if equal to the live hash, counts as acceptance
    pub override_env: Option<String>,
}

/// Time window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTimeWindow {
    /// Days of week: "weekdays", "weekends", "all", or list like ["mon", "tue", "wed"]
    pub days: RawDays,

    /// Start time (HH:MM format)
    pub start: String,

    /// End time (HH:MM format). At or before `start` means the window wraps past midnight.
    pub end: String,
}

/// Days specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}

/// Supervised command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawWorkload {
    /// Program to run (absolute, relative to cwd, or looked up on PATH)
    pub command: String,

    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory (default: the service working directory)
    pub cwd: Option<PathBuf>,

    /// SIGTERM -> SIGKILL escalation delay (default 5)
    pub stop_timeout_seconds: Option<u64>,
}
