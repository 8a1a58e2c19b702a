//! Motion event and visit records.
//!
//! Both are plain immutable values. Timestamps are absolute instants held in
//! UTC; wall-clock interpretation always goes through [`LocalZone`].
//!
//! [`LocalZone`]: crate::core::LocalZone

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a record from inconsistent timestamps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("motion stopped at {stop} before it started at {start}")]
    StopBeforeStart {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

/// A single contiguous interval during which the sensor reported motion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEvent {
    /// Identifier of the sensor that produced the event
    pub device_id: String,
    /// When motion was first reported
    pub start_timestamp: DateTime<Utc>,
    /// When the sensor returned to idle (never before `start_timestamp`)
    pub stop_timestamp: DateTime<Utc>,
}

impl MotionEvent {
    pub fn new(
        device_id: impl Into<String>,
        start_timestamp: DateTime<Utc>,
        stop_timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        if stop_timestamp < start_timestamp {
            return Err(EventError::StopBeforeStart {
                start: start_timestamp,
                stop: stop_timestamp,
            });
        }
        Ok(Self {
            device_id: device_id.into(),
            start_timestamp,
            stop_timestamp,
        })
    }

    /// How long the sensor stayed active.
    pub fn active_duration(&self) -> Duration {
        self.stop_timestamp - self.start_timestamp
    }
}

/// A cluster of two or more motion events read as one bathroom visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub device_id: String,
    /// Start of the first event in the cluster
    pub visit_start: DateTime<Utc>,
    /// Stop of the last event in the cluster
    pub visit_end: DateTime<Utc>,
    /// Number of motion events merged into this visit (always >= 2)
    pub event_count: usize,
    /// Whole seconds between `visit_start` and `visit_end`
    pub duration_seconds: i64,
}

impl Visit {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    /// Duration in minutes, for display.
    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_rejects_inverted_interval() {
        let start = Utc.with_ymd_and_hms(2025, 8, 14, 9, 0, 10).unwrap();
        let stop = Utc.with_ymd_and_hms(2025, 8, 14, 9, 0, 0).unwrap();

        let err = MotionEvent::new("pir_sensor_GPIO4", start, stop).unwrap_err();
        assert!(matches!(err, EventError::StopBeforeStart { .. }));
    }

    #[test]
    fn test_event_allows_zero_length_interval() {
        let at = Utc.with_ymd_and_hms(2025, 8, 14, 9, 0, 0).unwrap();
        let event = MotionEvent::new("pir_sensor_GPIO4", at, at).unwrap();
        assert_eq!(event.active_duration(), Duration::zero());
    }

    #[test]
    fn test_visit_duration_minutes() {
        let start = Utc.with_ymd_and_hms(2025, 8, 14, 9, 0, 0).unwrap();
        let visit = Visit {
            device_id: "pir_sensor_GPIO4".to_string(),
            visit_start: start,
            visit_end: start + Duration::seconds(90),
            event_count: 3,
            duration_seconds: 90,
        };
        assert!((visit.duration_minutes() - 1.5).abs() < 1e-9);
        assert_eq!(visit.duration(), Duration::seconds(90));
    }
}
