//! Configuration validation

use crate::policy::{DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_STOP_TIMEOUT_SECS};
use crate::schema::{RawConfig, RawDays, RawDocument, RawTimeWindow};
use curfew_util::DaysOfWeek;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("service.{field} must be greater than zero")]
    ZeroInterval { field: String },

    #[error(
        "workload.stop_timeout_seconds ({stop_timeout}) must be less than service.shutdown_grace_seconds ({shutdown_grace})"
    )]
    StopTimeoutExceedsGrace { stop_timeout: u64, shutdown_grace: u64 },

    #[error("Workload: {0}")]
    WorkloadError(String),

    #[error("Consent document '{document}': {message}")]
    ConsentError { document: String, message: String },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let service = &config.service;
    for (field, value) in [
        ("poll_interval_seconds", service.poll_interval_seconds),
        ("watchdog_interval_seconds", service.watchdog_interval_seconds),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroInterval {
                field: field.to_string(),
            });
        }
    }

    if service
        .env_file
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        errors.push(ValidationError::GlobalError(
            "service.env_file cannot be empty (omit it to disable)".into(),
        ));
    }

    errors.extend(validate_consent(config));

    if let Some(windows) = &config.schedule {
        for window in windows {
            errors.extend(validate_time_window(window));
        }
    }

    // The process must be stopped before the sweep's abort deadline
    let stop_timeout = config
        .workload
        .stop_timeout_seconds
        .unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);
    let shutdown_grace = service
        .shutdown_grace_seconds
        .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS);
    if stop_timeout >= shutdown_grace {
        errors.push(ValidationError::StopTimeoutExceedsGrace {
            stop_timeout,
            shutdown_grace,
        });
    }

    if config.workload.command.trim().is_empty() {
        errors.push(ValidationError::WorkloadError(
            "command cannot be empty".into(),
        ));
    }

    errors
}

fn validate_consent(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let documents = [
        ("eula", config.consent.eula.as_ref()),
        ("privacy", config.consent.privacy.as_ref()),
    ];

    for (name, doc) in documents {
        let Some(doc) = doc else { continue };
        errors.extend(validate_document(name, doc));
    }

    // Both documents sharing a marker would make one acceptance overwrite the other
    let eula_marker = config
        .consent
        .eula
        .as_ref()
        .and_then(|d| d.marker.as_ref());
    let privacy_marker = config
        .consent
        .privacy
        .as_ref()
        .and_then(|d| d.marker.as_ref());
    if let (Some(a), Some(b)) = (eula_marker, privacy_marker)
        && a == b
    {
        errors.push(ValidationError::ConsentError {
            document: "privacy".into(),
            message: format!("marker '{}' is also used by eula", b.display()),
        });
    }

    errors
}

fn validate_document(name: &str, doc: &RawDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if doc.document.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
        errors.push(ValidationError::ConsentError {
            document: name.to_string(),
            message: "document path cannot be empty".into(),
        });
    }

    if doc.marker.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
        errors.push(ValidationError::ConsentError {
            document: name.to_string(),
            message: "marker path cannot be empty".into(),
        });
    }

    if doc.override_env.as_ref().is_some_and(|v| v.trim().is_empty()) {
        errors.push(ValidationError::ConsentError {
            document: name.to_string(),
            message: "override_env cannot be empty (omit it to disable)".into(),
        });
    }

    errors
}

fn validate_time_window(window: &RawTimeWindow) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = parse_days(&window.days) {
        errors.push(ValidationError::InvalidDaySpec(e));
    }

    if let Err(e) = parse_time(&window.start) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.start.clone(),
            message: e,
        });
    }

    if let Err(e) = parse_time(&window.end) {
        errors.push(ValidationError::InvalidTimeFormat {
            value: window.end.clone(),
            message: e,
        });
    }

    errors
}

/// Parse a 24-hour `HH:MM` clock value
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| "expected HH:MM".to_string())?;

    let field = |text: &str, limit: u8, what: &str| -> Result<u8, String> {
        match text.parse::<u8>() {
            Ok(v) if v < limit => Ok(v),
            Ok(_) => Err(format!("{what} out of range (0-{})", limit - 1)),
            Err(_) => Err(format!("{what} '{text}' is not a number")),
        }
    };

    Ok((field(h, 24, "hour")?, field(m, 60, "minute")?))
}

const DAY_ALIASES: [(&str, &str); 7] = [
    ("mon", "monday"),
    ("tue", "tuesday"),
    ("wed", "wednesday"),
    ("thu", "thursday"),
    ("fri", "friday"),
    ("sat", "saturday"),
    ("sun", "sunday"),
];

/// Parse a day preset or explicit day list into a Monday-first bit mask
pub fn parse_days(days: &RawDays) -> Result<u8, String> {
    let list = match days {
        RawDays::Preset(preset) => {
            let mask = match preset.to_ascii_lowercase().as_str() {
                "all" | "every" | "daily" => DaysOfWeek::ALL_DAYS,
                "weekdays" => DaysOfWeek::WEEKDAYS,
                "weekends" => DaysOfWeek::WEEKENDS,
                other => return Err(format!("unknown day preset '{other}'")),
            };
            return Ok(mask.bits());
        }
        RawDays::List(list) if list.is_empty() => {
            return Err("day list cannot be empty".into());
        }
        RawDays::List(list) => list,
    };

    list.iter().try_fold(0u8, |mask, day| {
        let wanted = day.to_ascii_lowercase();
        DAY_ALIASES
            .iter()
            .position(|(short, long)| *short == wanted || *long == wanted)
            .map(|bit| mask | (1 << bit))
            .ok_or_else(|| format!("unknown day '{day}'"))
    })
}
