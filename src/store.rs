//! SQLite persistence for motion events and detected visits.
//!
//! Timestamps are written as RFC 3339 UTC text with microsecond precision.
//! Databases written by older versions of the monitor hold zone-less
//! `YYYY-MM-DD HH:MM:SS[.f]` values; those are read as local time in the
//! store's zone.

use crate::collector::types::{EventError, MotionEvent, Visit};
use crate::core::timezone::LocalZone;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

/// Errors raised by [`EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable timestamp {0:?}")]
    Timestamp(String),
    #[error("invalid stored event: {0}")]
    Event(#[from] EventError),
}

/// Motion event and visit storage.
pub struct EventStore {
    conn: Connection,
    zone: LocalZone,
}

impl EventStore {
    /// Open or create a store at `path`, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS motion_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                start_timestamp TEXT NOT NULL,
                stop_timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_motion_events_start
                ON motion_events(start_timestamp);

            CREATE TABLE IF NOT EXISTS bathroom_visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                visit_start TEXT NOT NULL,
                visit_end TEXT NOT NULL,
                event_count INTEGER NOT NULL,
                duration_seconds INTEGER NOT NULL,
                detected_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_bathroom_visits_device_start
                ON bathroom_visits(device_id, visit_start);
            ",
        )?;
        Ok(Self {
            conn,
            zone: LocalZone::default(),
        })
    }

    /// Zone used to interpret zone-less legacy timestamps.
    pub fn with_zone(mut self, zone: LocalZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn zone(&self) -> &LocalZone {
        &self.zone
    }

    /// Persist one motion event, returning its row id.
    pub fn add_event(&self, event: &MotionEvent) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO motion_events (device_id, start_timestamp, stop_timestamp)
             VALUES (?1, ?2, ?3)",
            params![
                event.device_id,
                encode_timestamp(&event.start_timestamp),
                encode_timestamp(&event.stop_timestamp),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Events whose start lies in `[start, end]`, ordered by start.
    pub fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MotionEvent>, StoreError> {
        let (lower, upper) = coarse_bounds(start, end);
        let mut stmt = self.conn.prepare(
            "SELECT device_id, start_timestamp, stop_timestamp
             FROM motion_events
             WHERE start_timestamp >= ?1 AND start_timestamp < ?2
             ORDER BY start_timestamp, id",
        )?;
        let rows = stmt
            .query_map(params![lower, upper], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (device_id, raw_start, raw_stop) in rows {
            let started = self.decode_timestamp(&raw_start)?;
            if started < start || started > end {
                continue;
            }
            let stopped = self.decode_timestamp(&raw_stop)?;
            events.push(MotionEvent::new(device_id, started, stopped)?);
        }
        events.sort_by_key(|e| e.start_timestamp);
        Ok(events)
    }

    /// Number of stored motion events.
    pub fn count_events(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM motion_events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Persist visits in a single transaction.
    ///
    /// A visit already stored for the same device and start is skipped.
    /// Returns the number of rows inserted.
    pub fn add_visits(
        &mut self,
        visits: &[Visit],
        detected_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if visits.is_empty() {
            return Ok(0);
        }
        let detected_at = encode_timestamp(&detected_at);
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO bathroom_visits
                 (device_id, visit_start, visit_end, event_count, duration_seconds, detected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for visit in visits {
                inserted += stmt.execute(params![
                    visit.device_id,
                    encode_timestamp(&visit.visit_start),
                    encode_timestamp(&visit.visit_end),
                    visit.event_count as i64,
                    visit.duration_seconds,
                    detected_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Visits whose start lies in `[start, end]`, ordered by start.
    pub fn visits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Visit>, StoreError> {
        let (lower, upper) = coarse_bounds(start, end);
        let mut visits = self.query_visits(&lower, &upper)?;
        visits.retain(|v| v.visit_start >= start && v.visit_start <= end);
        Ok(visits)
    }

    /// Visits starting on local dates `from..=to` in the store's zone.
    pub fn visits_for_dates(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Visit>, StoreError> {
        let lower = from
            .checked_sub_days(Days::new(1))
            .unwrap_or(from)
            .format("%Y-%m-%d")
            .to_string();
        let upper = to
            .checked_add_days(Days::new(2))
            .unwrap_or(to)
            .format("%Y-%m-%d")
            .to_string();
        let mut visits = self.query_visits(&lower, &upper)?;
        visits.retain(|v| {
            let local_date = self.zone.to_local(&v.visit_start).date_naive();
            local_date >= from && local_date <= to
        });
        Ok(visits)
    }

    fn query_visits(&self, lower: &str, upper: &str) -> Result<Vec<Visit>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT device_id, visit_start, visit_end, event_count, duration_seconds
             FROM bathroom_visits
             WHERE visit_start >= ?1 AND visit_start < ?2
             ORDER BY visit_start, id",
        )?;
        let rows = stmt
            .query_map(params![lower, upper], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut visits = Vec::with_capacity(rows.len());
        for (device_id, raw_start, raw_end, event_count, duration_seconds) in rows {
            visits.push(Visit {
                device_id,
                visit_start: self.decode_timestamp(&raw_start)?,
                visit_end: self.decode_timestamp(&raw_end)?,
                event_count: event_count.max(0) as usize,
                duration_seconds,
            });
        }
        visits.sort_by_key(|v| v.visit_start);
        Ok(visits)
    }

    fn decode_timestamp(&self, raw: &str) -> Result<DateTime<Utc>, StoreError> {
        decode_timestamp(raw, &self.zone)
    }
}

/// Canonical text form of a stored instant.
pub fn encode_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp; zone-less values are local time in `zone`.
pub fn decode_timestamp(raw: &str, zone: &LocalZone) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| StoreError::Timestamp(raw.to_string()))?;
    Ok(zone.from_naive(naive).with_timezone(&Utc))
}

/// Date-prefix bounds wide enough to cover both canonical and legacy rows.
///
/// Both formats begin with a calendar date, and a local date never differs
/// from the UTC date by more than a day, so rows are narrowed by text and
/// then filtered exactly after decoding.
fn coarse_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> (String, String) {
    let lower = start.date_naive();
    let lower = lower.checked_sub_days(Days::new(1)).unwrap_or(lower);
    let upper = end.date_naive();
    let upper = upper.checked_add_days(Days::new(2)).unwrap_or(upper);
    (
        lower.format("%Y-%m-%d").to_string(),
        upper.format("%Y-%m-%d").to_string(),
    )
}
