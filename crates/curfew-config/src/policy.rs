//! Validated policy structures

use crate::schema::{RawConfig, RawDocument, RawServiceConfig, RawTimeWindow, RawWorkload};
use crate::validation::{parse_days, parse_time};
use curfew_api::DocumentKind;
use curfew_util::{DaysOfWeek, TimeWindow, WallClock, resolve_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default for `service.shutdown_grace_seconds`
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Default for `workload.stop_timeout_seconds`
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Validated policy ready for use by the daemon
#[derive(Debug, Clone)]
pub struct Policy {
    pub service: ServiceConfig,
    pub consent: ConsentPolicy,
    /// Allowed windows; an empty list never allows the workload to run
    pub schedule: Vec<TimeWindow>,
    pub workload: WorkloadSpec,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let schedule = match raw.schedule {
            Some(windows) => windows.into_iter().map(convert_time_window).collect(),
            None => default_schedule(),
        };

        for window in schedule.iter().filter(|w| w.is_zero_width()) {
            warn!(window = %window, "Zero-width window never matches");
        }

        Self {
            service: ServiceConfig::from_raw(raw.service),
            consent: ConsentPolicy::from_raw(raw.consent.eula, raw.consent.privacy),
            schedule,
            workload: WorkloadSpec::from_raw(raw.workload),
        }
    }

    /// Resolve every relative path against `base`
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if let Some(env_file) = self.service.env_file.take() {
            self.service.env_file = Some(resolve_path(base, &env_file));
        }
        for doc in [&mut self.consent.eula, &mut self.consent.privacy] {
            doc.document = resolve_path(base, &doc.document);
            doc.marker = resolve_path(base, &doc.marker);
        }
        self.workload.cwd = Some(match self.workload.cwd.take() {
            Some(cwd) => resolve_path(base, &cwd),
            None => base.to_path_buf(),
        });
        self
    }
}

/// Supervisor cadence and bootstrap settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub poll_interval: Duration,
    pub watchdog_initial_delay: Duration,
    pub watchdog_interval: Duration,
    pub shutdown_grace: Duration,
    pub env_file: Option<PathBuf>,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: raw
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            watchdog_initial_delay: raw
                .watchdog_initial_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.watchdog_initial_delay),
            watchdog_interval: raw
                .watchdog_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.watchdog_interval),
            shutdown_grace: raw
                .shutdown_grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            env_file: raw.env_file,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            watchdog_initial_delay: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            env_file: None,
        }
    }
}

/// Where a consent document and its acceptance marker live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPolicy {
    pub kind: DocumentKind,
    pub document: PathBuf,
    pub marker: PathBuf,
    pub override_env: Option<String>,
}

impl DocumentPolicy {
    pub fn default_for(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Eula => Self {
                kind,
                document: PathBuf::from("EULA.md"),
                marker: PathBuf::from("eula.confirmed"),
                override_env: Some("EULA_AGREE".into()),
            },
            DocumentKind::Privacy => Self {
                kind,
                document: PathBuf::from("PRIVACY.md"),
                marker: PathBuf::from("privacy.confirmed"),
                override_env: Some("PRIVACY_AGREE".into()),
            },
        }
    }

    fn from_raw(kind: DocumentKind, raw: Option<RawDocument>) -> Self {
        let defaults = Self::default_for(kind);
        let Some(raw) = raw else { return defaults };
        Self {
            kind,
            document: raw.document.unwrap_or(defaults.document),
            marker: raw.marker.unwrap_or(defaults.marker),
            override_env: raw.override_env.or(defaults.override_env),
        }
    }
}

/// Both consent documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentPolicy {
    pub eula: DocumentPolicy,
    pub privacy: DocumentPolicy,
}

impl ConsentPolicy {
    fn from_raw(eula: Option<RawDocument>, privacy: Option<RawDocument>) -> Self {
        Self {
            eula: DocumentPolicy::from_raw(DocumentKind::Eula, eula),
            privacy: DocumentPolicy::from_raw(DocumentKind::Privacy, privacy),
        }
    }

    pub fn documents(&self) -> [&DocumentPolicy; 2] {
        [&self.eula, &self.privacy]
    }
}

impl Default for ConsentPolicy {
    fn default() -> Self {
        Self::from_raw(None, None)
    }
}

/// The supervised command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub stop_timeout: Duration,
}

impl WorkloadSpec {
    fn from_raw(raw: RawWorkload) -> Self {
        Self {
            command: raw.command,
            args: raw.args,
            env: raw.env,
            cwd: raw.cwd,
            stop_timeout: Duration::from_secs(
                raw.stop_timeout_seconds
                    .unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            ),
        }
    }
}

// Conversion helpers

fn convert_time_window(raw: RawTimeWindow) -> TimeWindow {
    let days_mask = parse_days(&raw.days).unwrap_or(0x7F);
    let (start_h, start_m) = parse_time(&raw.start).unwrap_or((0, 0));
    let (end_h, end_m) = parse_time(&raw.end).unwrap_or((0, 0));

    TimeWindow {
        days: DaysOfWeek::new(days_mask),
        start: WallClock { hour: start_h, minute: start_m },
        end: WallClock { hour: end_h, minute: end_m },
    }
}

fn window(days: DaysOfWeek, start: (u8, u8), end: (u8, u8)) -> TimeWindow {
    TimeWindow {
        days,
        start: WallClock { hour: start.0, minute: start.1 },
        end: WallClock { hour: end.0, minute: end.1 },
    }
}

/// Built-in schedule: two short weekday slots, two long weekend slots
/// that run past midnight.
pub fn default_schedule() -> Vec<TimeWindow> {
    vec![
        window(DaysOfWeek::WEEKDAYS, (11, 0), (13, 0)),
        window(DaysOfWeek::WEEKDAYS, (21, 0), (23, 45)),
        window(DaysOfWeek::WEEKENDS, (10, 0), (2, 0)),
        window(DaysOfWeek::WEEKENDS, (20, 0), (1, 30)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    #[test]
    fn test_defaults_applied() {
        let policy = parse_config(
            r#"
            config_version = 1

            [workload]
            command = "bot"
        "#,
        )
        .unwrap();

        assert_eq!(policy.service, ServiceConfig::default());
        assert_eq!(policy.consent, ConsentPolicy::default());
        assert_eq!(policy.schedule, default_schedule());
        assert_eq!(policy.workload.stop_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_document_override_keeps_defaults() {
        let policy = parse_config(
            r#"
            config_version = 1

            [consent.privacy]
            document = "legal/privacy.md"

            [workload]
            command = "bot"
        "#,
        )
        .unwrap();

        assert_eq!(policy.consent.privacy.document, PathBuf::from("legal/privacy.md"));
        assert_eq!(policy.consent.privacy.marker, PathBuf::from("privacy.confirmed"));
        assert_eq!(policy.consent.privacy.override_env.as_deref(), Some("PRIVACY_AGREE"));
    }

    #[test]
    fn test_resolve_paths() {
        let policy = parse_config(
            r#"
            config_version = 1

            [service]
            env_file = ".env"

            [consent.eula]
            document = "/etc/curfew/EULA.md"

            [workload]
            command = "bot"
        "#,
        )
        .unwrap()
        .resolve_paths(Path::new("/srv/bot"));

        assert_eq!(policy.service.env_file, Some(PathBuf::from("/srv/bot/.env")));
        assert_eq!(policy.consent.eula.document, PathBuf::from("/etc/curfew/EULA.md"));
        assert_eq!(policy.consent.eula.marker, PathBuf::from("/srv/bot/eula.confirmed"));
        assert_eq!(policy.workload.cwd, Some(PathBuf::from("/srv/bot")));
    }

    #[test]
    fn test_default_schedule_shape() {
        let schedule = default_schedule();
        assert_eq!(schedule.len(), 4);
        assert!(schedule.iter().filter(|w| w.days == DaysOfWeek::WEEKENDS).all(|w| w.wraps_midnight()));
        assert!(schedule.iter().filter(|w| w.days == DaysOfWeek::WEEKDAYS).all(|w| !w.wraps_midnight()));
    }
}
