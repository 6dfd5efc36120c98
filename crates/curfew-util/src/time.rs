//! Time utilities for curfew
//!
//! Provides the wall-clock types used by availability windows and the
//! [`Clock`] seam the supervisor reads "now" through.
//!
//! # Mock time
//!
//! Debug builds honour `CURFEW_MOCK_TIME` (`YYYY-MM-DD HH:MM:SS`). The
//! value is turned into a fixed offset when first read, so the mocked
//! clock keeps ticking from the given instant:
//!
//! ```bash
//! CURFEW_MOCK_TIME="2025-12-27 23:00:00" curfewd --config config.toml
//! ```

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

/// Debug-only override for the system clock
pub const MOCK_TIME_ENV_VAR: &str = "CURFEW_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SECS_PER_DAY: u32 = 24 * 60 * 60;

static MOCK_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn mock_offset() -> Option<chrono::Duration> {
    *MOCK_OFFSET.get_or_init(|| {
        if cfg!(debug_assertions) {
            std::env::var(MOCK_TIME_ENV_VAR)
                .ok()
                .and_then(|raw| offset_from_mock(&raw))
        } else {
            None
        }
    })
}

#[allow(clippy::disallowed_methods)]
fn offset_from_mock(raw: &str) -> Option<chrono::Duration> {
    let Ok(naive) = NaiveDateTime::parse_from_str(raw, MOCK_TIME_FORMAT) else {
        tracing::warn!(
            value = %raw,
            expected_format = MOCK_TIME_FORMAT,
            "Ignoring {MOCK_TIME_ENV_VAR}: unparseable"
        );
        return None;
    };

    let Some(target) = Local.from_local_datetime(&naive).single() else {
        tracing::warn!(value = %raw, "Ignoring {MOCK_TIME_ENV_VAR}: ambiguous local time");
        return None;
    };

    let offset = target.signed_duration_since(Local::now());
    tracing::info!(value = %raw, offset_secs = offset.num_seconds(), "Mock clock active");
    Some(offset)
}

/// Whether `CURFEW_MOCK_TIME` took effect.
pub fn is_mock_time_active() -> bool {
    mock_offset().is_some()
}

/// Local time, shifted by the mock offset when one is active.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    let real = Local::now();
    mock_offset().map_or(real, |offset| real + offset)
}

/// Source of wall-clock time.
///
/// The supervisor and watchdog never call `Local::now()` directly so that
/// window decisions can be driven from tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The process clock (mock-time aware in debug builds).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, dt: DateTime<Local>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = dt;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `YYYY-MM-DD HH:MM:SS`, the same shape the mock clock accepts.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format(MOCK_TIME_FORMAT).to_string()
}

/// Time of day at minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub const MIDNIGHT: WallClock = WallClock { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn from_datetime(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    pub fn seconds_into_day(&self) -> u32 {
        (u32::from(self.hour) * 60 + u32::from(self.minute)) * 60
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.hour, self.minute).cmp(&(other.hour, other.minute))
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Set of weekdays; bit 0 is Monday, bit 6 is Sunday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0b111_1111);
    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(0b001_1111);
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(0b110_0000);
    pub const NONE: DaysOfWeek = DaysOfWeek(0);

    /// Build from a raw mask. Bits above Sunday are dropped.
    pub fn new(mask: u8) -> Self {
        Self(mask & Self::ALL_DAYS.0)
    }

    pub fn single(day: Weekday) -> Self {
        Self(1 << day.num_days_from_monday())
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::single(day).0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DaysOfWeek {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preset = match *self {
            Self::ALL_DAYS => Some("all"),
            Self::WEEKDAYS => Some("weekdays"),
            Self::WEEKENDS => Some("weekends"),
            Self::NONE => Some("none"),
            _ => None,
        };
        if let Some(name) = preset {
            return f.write_str(name);
        }

        let mut first = true;
        for (bit, name) in DAY_NAMES.iter().enumerate() {
            if self.0 & (1 << bit) == 0 {
                continue;
            }
            if !first {
                f.write_str(",")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// A time window during which the workload may run.
///
/// `end < start` denotes a window that wraps past midnight. The day mask
/// is evaluated against the day of the instant being tested, so the
/// after-midnight tail of a wrapping window belongs to the next calendar
/// day only if that day is also in the mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub days: DaysOfWeek,
    pub start: WallClock,
    pub end: WallClock,
}

impl TimeWindow {
    pub fn new(days: DaysOfWeek, start: WallClock, end: WallClock) -> Self {
        Self { days, start, end }
    }

    /// True when the window crosses midnight (e.g. 22:00 - 02:00)
    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    /// A window whose start equals its end never matches.
    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }

    /// Start inclusive, end exclusive.
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        if !self.days.contains(dt.weekday()) {
            return false;
        }

        let at = WallClock::from_datetime(dt);
        match self.start.cmp(&self.end) {
            Ordering::Less => self.start <= at && at < self.end,
            Ordering::Greater => at >= self.start || at < self.end,
            Ordering::Equal => false,
        }
    }

    /// Time left before the window stops matching, or `None` when `dt` is
    /// outside it.
    ///
    /// The evening part of a wrapping window only runs on past midnight when
    /// the next day is also in `days`; otherwise it ends at midnight.
    pub fn remaining_duration(&self, dt: &DateTime<Local>) -> Option<Duration> {
        if !self.contains(dt) {
            return None;
        }

        let now = dt.num_seconds_from_midnight();
        let mut end = self.end.seconds_into_day();
        if self.wraps_midnight() && now >= self.start.seconds_into_day() {
            end = if self.days.contains(dt.weekday().succ()) {
                end + SECS_PER_DAY
            } else {
                SECS_PER_DAY
            };
        }

        Some(Duration::from_secs(u64::from(end.saturating_sub(now))))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.days, self.start, self.end)
    }
}

/// Compact duration for log lines: `45s`, `3m 5s`, `2h 0m 10s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m {s}s"),
    }
}
