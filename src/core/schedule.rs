//! Nightly monitoring and reporting windows.
//!
//! Detection runs from the window start until the configured end time. The
//! report always covers today's window, on the assumption that the report
//! job runs once per day after the window has closed.

use crate::core::timezone::LocalZone;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

/// Local time-of-day span during which motion is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(0, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl NightWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether a local wall-clock time falls inside the window.
    ///
    /// Windows whose start is after their end wrap past midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// When the current detection run must stop and how long that is from now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionPlan {
    pub now: DateTime<Tz>,
    pub target_end: DateTime<Tz>,
    /// Whole seconds from `now` until `target_end`
    pub duration_secs: i64,
}

impl DetectionPlan {
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs as f64 / 3600.0
    }
}

/// Absolute bounds of the window analyzed by a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub date: NaiveDate,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Compute when detection started at `now` should stop.
///
/// The end is today at `window.end`, unless `now`'s local hour has already
/// reached the end hour, in which case it rolls to tomorrow at the same
/// wall-clock time.
pub fn plan_detection(zone: &LocalZone, now: DateTime<Tz>, window: &NightWindow) -> DetectionPlan {
    let now = zone.to_local(&now);
    let today = now.date_naive();

    let end_date = if now.hour() >= window.end.hour() {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    } else {
        today
    };
    let target_end = zone.on_date_at(end_date, window.end);

    DetectionPlan {
        duration_secs: (target_end - now).num_seconds(),
        now,
        target_end,
    }
}

/// The report window for `date`: that day's window start until its end.
pub fn report_window(zone: &LocalZone, date: NaiveDate, window: &NightWindow) -> ReportWindow {
    ReportWindow {
        date,
        start: zone.on_date_at(date, window.start),
        end: zone.on_date_at(date, window.end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_plan_before_end_targets_today() {
        let zone = LocalZone::default();
        let now = zone.on_date_at(date(2025, 8, 14), time(0, 30));
        let plan = plan_detection(&zone, now, &NightWindow::default());

        assert_eq!(plan.target_end, zone.on_date_at(date(2025, 8, 14), time(8, 0)));
        assert_eq!(plan.duration_secs, 27_000);
        assert!((plan.duration_hours() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_plan_after_end_rolls_to_tomorrow() {
        let zone = LocalZone::default();
        let now = zone.on_date_at(date(2025, 8, 14), time(10, 0));
        let plan = plan_detection(&zone, now, &NightWindow::default());

        assert_eq!(plan.target_end, zone.on_date_at(date(2025, 8, 15), time(8, 0)));
        assert_eq!(plan.duration_secs, 22 * 3600);
    }

    #[test]
    fn test_plan_at_end_hour_rolls_over() {
        let zone = LocalZone::default();
        let now = zone.on_date_at(date(2025, 8, 14), time(8, 0));
        let plan = plan_detection(&zone, now, &NightWindow::default());

        assert_eq!(plan.target_end.date_naive(), date(2025, 8, 15));
        assert_eq!(plan.duration_secs, 24 * 3600);
    }

    #[test]
    fn test_plan_truncates_fractional_seconds() {
        let zone = LocalZone::default();
        let now = zone.on_date_at(date(2025, 8, 14), time(7, 59)) + Duration::milliseconds(500);
        let plan = plan_detection(&zone, now, &NightWindow::default());
        assert_eq!(plan.duration_secs, 59);
    }

    #[test]
    fn test_plan_uses_zone_for_utc_input() {
        let zone = LocalZone::default();
        // 07:30 UTC is 00:30 PDT.
        let utc_now = Utc.with_ymd_and_hms(2025, 8, 14, 7, 30, 0).unwrap();
        let plan = plan_detection(&zone, zone.to_local(&utc_now), &NightWindow::default());
        assert_eq!(plan.duration_secs, 27_000);
    }

    #[test]
    fn test_rollover_across_dst_keeps_wall_clock() {
        let zone = LocalZone::default();
        // Clocks spring forward during the night of 2025-03-08 → 03-09.
        let now = zone.on_date_at(date(2025, 3, 8), time(22, 0));
        let plan = plan_detection(&zone, now, &NightWindow::default());

        assert_eq!(plan.target_end.hour(), 8);
        assert_eq!(plan.target_end.date_naive(), date(2025, 3, 9));
        assert_eq!(plan.duration_secs, 9 * 3600);
    }

    #[test]
    fn test_report_window_is_today_without_rollover() {
        let zone = LocalZone::default();
        let window = report_window(&zone, date(2025, 8, 14), &NightWindow::default());

        assert_eq!(window.start, zone.on_date_at(date(2025, 8, 14), time(0, 30)));
        assert_eq!(window.end, zone.on_date_at(date(2025, 8, 14), time(8, 0)));
        assert_eq!((window.end - window.start).num_minutes(), 450);
    }

    #[test]
    fn test_night_window_contains() {
        let window = NightWindow::default();
        assert!(window.contains(time(0, 30)));
        assert!(window.contains(time(3, 0)));
        assert!(!window.contains(time(8, 0)));
        assert!(!window.contains(time(0, 10)));

        let wrapping = NightWindow::new(time(22, 0), time(6, 0));
        assert!(wrapping.contains(time(23, 0)));
        assert!(wrapping.contains(time(1, 0)));
        assert!(!wrapping.contains(time(12, 0)));
    }
}
