//! Availability scheduler

use chrono::{DateTime, Local};
use curfew_util::TimeWindow;
use std::time::Duration;

/// Decides whether the service may be online at a given moment.
///
/// A window applies on the days it lists, judged by the date of the
/// moment being checked. So with a weekend window of 20:00-01:30,
/// Saturday 01:00 is allowed (Saturday's own window is still open from
/// the night before) while Monday 01:00 is not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityScheduler {
    windows: Vec<TimeWindow>,
}

impl AvailabilityScheduler {
    pub fn new(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// True if any window contains `now`. No windows means never allowed.
    pub fn is_allowed(&self, now: &DateTime<Local>) -> bool {
        self.windows.iter().any(|w| w.contains(now))
    }

    /// How long the longest-running window containing `now` stays open
    pub fn remaining_in_window(&self, now: &DateTime<Local>) -> Option<Duration> {
        self.windows
            .iter()
            .filter_map(|w| w.remaining_duration(now))
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use curfew_config::default_schedule;
    use curfew_util::{DaysOfWeek, WallClock};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        // 2025-12-27 is a Saturday, 2025-12-29 a Monday
        Local
            .with_ymd_and_hms(2025, 12, day, hour, minute, 0)
            .single()
            .unwrap()
    }

    const SAT: u32 = 27;
    const SUN: u32 = 28;
    const MON: u32 = 29;
    const TUE: u32 = 30;

    fn window(days: DaysOfWeek, start: (u8, u8), end: (u8, u8)) -> TimeWindow {
        TimeWindow::new(
            days,
            WallClock::new(start.0, start.1).unwrap(),
            WallClock::new(end.0, end.1).unwrap(),
        )
    }

    #[test]
    fn simple_window_is_half_open() {
        let scheduler = AvailabilityScheduler::new(vec![window(DaysOfWeek::ALL_DAYS, (11, 0), (13, 0))]);

        assert!(!scheduler.is_allowed(&at(MON, 10, 59)));
        assert!(scheduler.is_allowed(&at(MON, 11, 0)));
        assert!(scheduler.is_allowed(&at(MON, 12, 59)));
        assert!(!scheduler.is_allowed(&at(MON, 13, 0)));
    }

    #[test]
    fn wrapping_window() {
        let scheduler = AvailabilityScheduler::new(vec![window(DaysOfWeek::ALL_DAYS, (22, 0), (2, 0))]);

        assert!(scheduler.is_allowed(&at(TUE, 23, 30)));
        assert!(scheduler.is_allowed(&at(TUE, 1, 0)));
        assert!(!scheduler.is_allowed(&at(TUE, 12, 0)));
        assert!(!scheduler.is_allowed(&at(TUE, 2, 0)));
    }

    #[test]
    fn zero_width_window_never_matches() {
        let scheduler = AvailabilityScheduler::new(vec![window(DaysOfWeek::ALL_DAYS, (9, 0), (9, 0))]);

        for hour in 0..24 {
            assert!(!scheduler.is_allowed(&at(MON, hour, 0)));
        }
    }

    #[test]
    fn empty_schedule_is_never_allowed() {
        let scheduler = AvailabilityScheduler::default();
        assert!(!scheduler.is_allowed(&at(MON, 12, 0)));
        assert_eq!(scheduler.remaining_in_window(&at(MON, 12, 0)), None);
    }

    #[test]
    fn default_profiles() {
        let scheduler = AvailabilityScheduler::new(default_schedule());

        assert!(scheduler.is_allowed(&at(MON, 12, 0)));
        assert!(!scheduler.is_allowed(&at(MON, 15, 0)));
        assert!(scheduler.is_allowed(&at(MON, 23, 44)));
        assert!(!scheduler.is_allowed(&at(MON, 23, 45)));
        assert!(scheduler.is_allowed(&at(SAT, 23, 0)));
        assert!(scheduler.is_allowed(&at(SUN, 1, 0)));
        assert!(!scheduler.is_allowed(&at(SAT, 3, 0)));
        assert!(!scheduler.is_allowed(&at(SAT, 9, 59)));
    }

    #[test]
    fn weekday_and_weekend_differ() {
        let scheduler = AvailabilityScheduler::new(default_schedule());

        assert!(!scheduler.is_allowed(&at(TUE, 15, 0)));
        assert!(scheduler.is_allowed(&at(SAT, 15, 0)));

        // Monday morning is judged by the weekday profile
        assert!(!scheduler.is_allowed(&at(MON, 1, 0)));
    }

    #[test]
    fn remaining_time_uses_longest_window() {
        let scheduler = AvailabilityScheduler::new(default_schedule());

        assert_eq!(
            scheduler.remaining_in_window(&at(MON, 12, 0)),
            Some(Duration::from_secs(3600))
        );
        // 10:00-02:00 outlasts 20:00-01:30
        assert_eq!(
            scheduler.remaining_in_window(&at(SAT, 23, 0)),
            Some(Duration::from_secs(3 * 3600))
        );
        assert_eq!(scheduler.remaining_in_window(&at(MON, 15, 0)), None);
    }

    #[test]
    fn sunday_night_remaining_ends_at_midnight() {
        let scheduler = AvailabilityScheduler::new(default_schedule());

        assert_eq!(
            scheduler.remaining_in_window(&at(SUN, 23, 0)),
            Some(Duration::from_secs(3600))
        );
        assert!(!scheduler.is_allowed(&at(MON, 0, 0)));
    }
}
