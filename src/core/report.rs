//! Summary statistics over one night's visits.

use crate::collector::types::Visit;
use crate::core::timezone::LocalZone;
use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Aggregated report data for a single reporting date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub report_date: NaiveDate,
    pub total_visits: usize,
    /// Mean visit duration in seconds (0 when there are no visits)
    pub avg_duration: f64,
    /// Sum of visit durations in seconds
    pub total_time: i64,
    /// Local hour of day → visits starting in that hour; empty hours are absent
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub longest_visit: Option<Visit>,
    pub shortest_visit: Option<Visit>,
    /// The visits the report was computed from, in input order
    pub visits: Vec<Visit>,
}

impl ReportData {
    /// Hour with the most visits. Ties go to the earliest hour.
    pub fn peak_hour(&self) -> Option<(u32, usize)> {
        self.hourly_distribution
            .iter()
            .fold(None, |best: Option<(u32, usize)>, (&hour, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((hour, count)),
            })
    }

    pub fn avg_duration_minutes(&self) -> f64 {
        self.avg_duration / 60.0
    }

    pub fn total_time_minutes(&self) -> f64 {
        self.total_time as f64 / 60.0
    }

    /// Visits ordered by start time, for display.
    pub fn visits_chronological(&self) -> Vec<&Visit> {
        let mut visits: Vec<&Visit> = self.visits.iter().collect();
        visits.sort_by_key(|v| v.visit_start);
        visits
    }
}

/// Build the report for `report_date` from `visits`.
pub fn generate_report(visits: &[Visit], report_date: NaiveDate, zone: &LocalZone) -> ReportData {
    if visits.is_empty() {
        return ReportData {
            report_date,
            total_visits: 0,
            avg_duration: 0.0,
            total_time: 0,
            hourly_distribution: BTreeMap::new(),
            longest_visit: None,
            shortest_visit: None,
            visits: Vec::new(),
        };
    }

    let durations: Vec<f64> = visits.iter().map(|v| v.duration_seconds as f64).collect();
    let avg_duration = durations.iter().mean();
    let total_time = visits.iter().map(|v| v.duration_seconds).sum();

    let mut hourly_distribution = BTreeMap::new();
    for visit in visits {
        let hour = zone.to_local(&visit.visit_start).hour();
        *hourly_distribution.entry(hour).or_insert(0) += 1;
    }

    ReportData {
        report_date,
        total_visits: visits.len(),
        avg_duration,
        total_time,
        hourly_distribution,
        longest_visit: first_extreme(visits, |candidate, best| candidate > best).cloned(),
        shortest_visit: first_extreme(visits, |candidate, best| candidate < best).cloned(),
        visits: visits.to_vec(),
    }
}

/// Pick the visit whose duration beats all earlier ones under `better`.
///
/// Only a strict improvement replaces the current pick, so ties keep the
/// visit encountered first.
fn first_extreme(visits: &[Visit], better: impl Fn(i64, i64) -> bool) -> Option<&Visit> {
    visits.iter().fold(None, |best: Option<&Visit>, visit| match best {
        Some(current) if !better(visit.duration_seconds, current.duration_seconds) => Some(current),
        _ => Some(visit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, NaiveTime, Utc};

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 14).unwrap()
    }

    fn local(zone: &LocalZone, h: u32, m: u32) -> DateTime<Utc> {
        zone.on_date_at(report_date(), NaiveTime::from_hms_opt(h, m, 0).unwrap())
            .with_timezone(&Utc)
    }

    fn visit(start: DateTime<Utc>, duration_seconds: i64, event_count: usize) -> Visit {
        Visit {
            device_id: "pir_sensor_GPIO4".to_string(),
            visit_start: start,
            visit_end: start + Duration::seconds(duration_seconds),
            event_count,
            duration_seconds,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = generate_report(&[], report_date(), &LocalZone::default());

        assert_eq!(report.total_visits, 0);
        assert_eq!(report.avg_duration, 0.0);
        assert_eq!(report.total_time, 0);
        assert!(report.hourly_distribution.is_empty());
        assert!(report.longest_visit.is_none());
        assert!(report.shortest_visit.is_none());
        assert!(report.peak_hour().is_none());
    }

    #[test]
    fn test_report_statistics() {
        let zone = LocalZone::default();
        let visits = vec![
            visit(local(&zone, 1, 0), 300, 2),
            visit(local(&zone, 2, 30), 360, 3),
            visit(local(&zone, 4, 15), 420, 4),
        ];
        let report = generate_report(&visits, report_date(), &zone);

        assert_eq!(report.total_visits, 3);
        assert!((report.avg_duration - 360.0).abs() < 1e-9);
        assert_eq!(report.total_time, 1080);
        assert_eq!(report.longest_visit.as_ref().unwrap().duration_seconds, 420);
        assert_eq!(report.shortest_visit.as_ref().unwrap().duration_seconds, 300);
        assert!((report.avg_duration_minutes() - 6.0).abs() < 1e-9);
        assert!((report.total_time_minutes() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_hourly_distribution_uses_local_hour() {
        let zone = LocalZone::default();
        let visits = vec![
            visit(local(&zone, 2, 10), 60, 2),
            visit(local(&zone, 2, 50), 60, 2),
            visit(local(&zone, 5, 0), 60, 2),
        ];
        let report = generate_report(&visits, report_date(), &zone);

        let expected: BTreeMap<u32, usize> = [(2, 2), (5, 1)].into_iter().collect();
        assert_eq!(report.hourly_distribution, expected);
        assert!(!report.hourly_distribution.contains_key(&3));
        assert_eq!(report.peak_hour(), Some((2, 2)));
    }

    #[test]
    fn test_extremes_keep_first_on_ties() {
        let zone = LocalZone::default();
        let first_long = visit(local(&zone, 1, 0), 600, 2);
        let second_long = visit(local(&zone, 2, 0), 600, 5);
        let first_short = visit(local(&zone, 3, 0), 60, 2);
        let second_short = visit(local(&zone, 4, 0), 60, 7);
        let visits = vec![
            first_long.clone(),
            first_short.clone(),
            second_long,
            second_short,
        ];
        let report = generate_report(&visits, report_date(), &zone);

        assert_eq!(report.longest_visit, Some(first_long));
        assert_eq!(report.shortest_visit, Some(first_short));
    }

    #[test]
    fn test_peak_hour_tie_prefers_earliest() {
        let zone = LocalZone::default();
        let visits = vec![
            visit(local(&zone, 4, 0), 60, 2),
            visit(local(&zone, 1, 0), 60, 2),
        ];
        let report = generate_report(&visits, report_date(), &zone);
        assert_eq!(report.peak_hour(), Some((1, 1)));
    }

    #[test]
    fn test_visits_chronological() {
        let zone = LocalZone::default();
        let visits = vec![
            visit(local(&zone, 4, 0), 60, 2),
            visit(local(&zone, 1, 0), 90, 2),
        ];
        let report = generate_report(&visits, report_date(), &zone);
        let ordered = report.visits_chronological();

        assert_eq!(ordered[0].duration_seconds, 90);
        assert_eq!(ordered[1].duration_seconds, 60);
        // Input order is preserved on the report itself.
        assert_eq!(report.visits[0].duration_seconds, 60);
    }
}
