//! Fixed civil timezone used for every wall-clock decision.
//!
//! The monitor runs across midnight, so "today" must always be computed in
//! the configured zone and never in the host's system zone.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

/// Default zone for the monitor.
pub const DEFAULT_TIMEZONE: &str = "US/Pacific";

/// Default pattern for [`LocalZone::format`]: date, time and zone abbreviation.
pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Step used to walk forward out of a daylight-saving gap.
const GAP_STEP_MINUTES: i64 = 30;

/// A named civil timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalZone {
    tz: Tz,
}

impl Default for LocalZone {
    fn default() -> Self {
        Self {
            tz: chrono_tz::US::Pacific,
        }
    }
}

impl LocalZone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Look up a zone by its IANA name (e.g. `US/Pacific`).
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    /// The current moment in this zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Today's date in this zone.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Today (in this zone) at the given wall-clock time.
    pub fn today_at(&self, hour: u32, minute: u32, second: u32) -> Option<DateTime<Tz>> {
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        Some(self.on_date_at(self.today(), time))
    }

    /// The instant for `date` at `time` in this zone.
    ///
    /// Ambiguous wall-clock times (the repeated hour when clocks fall back)
    /// resolve to the earlier instant. Nonexistent times (the skipped hour
    /// when clocks spring forward) move forward to the first valid time.
    pub fn on_date_at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
        self.from_naive(date.and_time(time))
    }

    /// Interpret a zone-less timestamp as wall-clock time in this zone.
    pub fn from_naive(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        let mut candidate = naive;
        loop {
            match self.tz.from_local_datetime(&candidate) {
                LocalResult::Single(dt) => return dt,
                LocalResult::Ambiguous(earliest, _) => return earliest,
                LocalResult::None => candidate += Duration::minutes(GAP_STEP_MINUTES),
            }
        }
    }

    /// Express any instant in this zone.
    pub fn to_local<Z: TimeZone>(&self, instant: &DateTime<Z>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    /// Render an instant as text in this zone.
    pub fn format<Z: TimeZone>(&self, instant: &DateTime<Z>, pattern: &str) -> String {
        self.to_local(instant).format(pattern).to_string()
    }

    /// Render an instant with [`DEFAULT_FORMAT`].
    pub fn format_default<Z: TimeZone>(&self, instant: &DateTime<Z>) -> String {
        self.format(instant, DEFAULT_FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_default_zone_is_pacific() {
        let zone = LocalZone::default();
        assert_eq!(zone.name(), DEFAULT_TIMEZONE);
        assert_eq!(LocalZone::from_name(DEFAULT_TIMEZONE).unwrap().tz(), zone.tz());
    }

    #[test]
    fn test_from_name_rejects_unknown_zone() {
        assert!(LocalZone::from_name("Mars/Olympus_Mons").is_none());
    }

    #[test]
    fn test_now_is_close_to_utc_now() {
        let zone = LocalZone::default();
        let diff = (Utc::now() - zone.now().with_timezone(&Utc)).num_seconds().abs();
        assert!(diff < 5);
    }

    #[test]
    fn test_today_at_uses_zone_date() {
        let zone = LocalZone::default();
        let eight = zone.today_at(8, 0, 0).unwrap();
        assert_eq!(eight.date_naive(), zone.today());
        assert_eq!(eight.hour(), 8);
        assert!(zone.today_at(25, 0, 0).is_none());
    }

    #[test]
    fn test_naive_is_read_as_local_wall_clock() {
        let zone = LocalZone::default();
        let naive = date(2025, 8, 14).and_hms_opt(15, 45, 30).unwrap();
        let local = zone.from_naive(naive);

        assert_eq!(local.hour(), 15);
        assert_eq!(local.minute(), 45);
        // PDT is UTC-7 in August.
        assert_eq!(local.with_timezone(&Utc).hour(), 22);
    }

    #[test]
    fn test_to_local_converts_utc() {
        let zone = LocalZone::default();
        let utc = Utc.with_ymd_and_hms(2025, 8, 14, 19, 30, 0).unwrap();
        let local = zone.to_local(&utc);
        assert_eq!((local.hour(), local.minute()), (12, 30));

        let winter = Utc.with_ymd_and_hms(2025, 1, 15, 19, 30, 0).unwrap();
        assert_eq!(zone.to_local(&winter).hour(), 11);
    }

    #[test]
    fn test_ambiguous_time_resolves_to_earliest() {
        let zone = LocalZone::default();
        // 01:30 happens twice on 2025-11-02.
        let dt = zone.on_date_at(date(2025, 11, 2), time(1, 30));
        assert_eq!(dt.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 11, 2, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_nonexistent_time_moves_forward() {
        let zone = LocalZone::default();
        // 02:30 does not exist on 2025-03-09.
        let dt = zone.on_date_at(date(2025, 3, 9), time(2, 30));
        assert_eq!(dt.hour(), 3);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn test_format_default_includes_abbreviation() {
        let zone = LocalZone::default();
        let summer = Utc.with_ymd_and_hms(2025, 8, 14, 19, 30, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2025, 1, 15, 19, 30, 0).unwrap();

        assert_eq!(zone.format_default(&summer), "2025-08-14 12:30:00 PDT");
        assert_eq!(zone.format_default(&winter), "2025-01-15 11:30:00 PST");
        assert_eq!(zone.format(&summer, "%H:%M"), "12:30");
    }

    #[test]
    fn test_format_round_trip_preserves_wall_clock() {
        let zone = LocalZone::default();
        let cases = [
            (date(2025, 3, 9), time(3, 15)),
            (date(2025, 11, 2), time(1, 15)),
            (date(2025, 11, 2), time(4, 45)),
            (date(2025, 8, 14), time(2, 5)),
        ];

        for (d, t) in cases {
            let instant = zone.on_date_at(d, t);
            let text = zone.format(&instant, "%Y-%m-%d %H:%M:%S %z");
            let parsed: DateTime<FixedOffset> =
                DateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S %z").unwrap();

            assert_eq!(parsed, instant);
            let back = zone.to_local(&parsed);
            assert_eq!((back.hour(), back.minute()), (t.hour(), t.minute()));
        }
    }
}
