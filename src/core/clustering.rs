//! Grouping of raw motion events into bathroom visits.
//!
//! Events are sorted by start time and swept once. A cluster is anchored to
//! its first event: a later event joins while its start lies within the
//! cluster window measured from the anchor's start (boundary inclusive). The
//! gap to the immediately preceding event plays no part, so a slow train of
//! events is split once it drifts past the window even if no single gap is
//! large. Clusters holding a single event are dropped.

use crate::collector::types::{MotionEvent, Visit};
use chrono::{DateTime, Duration, Utc};

/// Default cluster window in minutes.
pub const DEFAULT_CLUSTER_WINDOW_MINUTES: u32 = 5;

/// Smallest number of events that counts as a visit.
pub const MIN_EVENTS_PER_VISIT: usize = 2;

/// Turns motion events into visits using a fixed cluster window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitDetector {
    cluster_window: Duration,
}

impl Default for VisitDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_WINDOW_MINUTES)
    }
}

impl VisitDetector {
    pub fn new(cluster_window_minutes: u32) -> Self {
        Self {
            cluster_window: Duration::minutes(i64::from(cluster_window_minutes)),
        }
    }

    pub fn cluster_window(&self) -> Duration {
        self.cluster_window
    }

    /// Detect visits in `events`, which may arrive in any order.
    pub fn detect(&self, events: &[MotionEvent]) -> Vec<Visit> {
        if events.len() < MIN_EVENTS_PER_VISIT {
            return Vec::new();
        }

        let mut sorted: Vec<&MotionEvent> = events.iter().collect();
        // Full ordering keeps the result independent of input order even when
        // two events share a start instant.
        sorted.sort_by(|a, b| {
            a.start_timestamp
                .cmp(&b.start_timestamp)
                .then(a.stop_timestamp.cmp(&b.stop_timestamp))
                .then_with(|| a.device_id.cmp(&b.device_id))
        });

        let mut visits = Vec::new();
        let mut cluster: Vec<&MotionEvent> = Vec::new();

        for event in sorted {
            let joins = match cluster.first() {
                Some(anchor) => within_window(
                    anchor.start_timestamp,
                    event.start_timestamp,
                    self.cluster_window,
                ),
                None => true,
            };

            if joins {
                cluster.push(event);
            } else {
                visits.extend(visit_from_cluster(&cluster));
                cluster = vec![event];
            }
        }
        visits.extend(visit_from_cluster(&cluster));

        visits
    }
}

/// Detect visits with a window given in minutes.
pub fn detect_visits(events: &[MotionEvent], cluster_window_minutes: u32) -> Vec<Visit> {
    VisitDetector::new(cluster_window_minutes).detect(events)
}

/// Whether `candidate` still belongs to a cluster whose first event started
/// at `anchor`. The boundary itself is inside the window.
pub fn within_window(anchor: DateTime<Utc>, candidate: DateTime<Utc>, window: Duration) -> bool {
    candidate - anchor <= window
}

/// Build a visit from a closed cluster ordered by start time.
///
/// Returns `None` for clusters too small to count as a visit.
pub fn visit_from_cluster(cluster: &[&MotionEvent]) -> Option<Visit> {
    if cluster.len() < MIN_EVENTS_PER_VISIT {
        return None;
    }
    let first = cluster.first()?;
    let last = cluster.last()?;

    let visit_start = first.start_timestamp;
    let visit_end = last.stop_timestamp;

    Some(Visit {
        device_id: first.device_id.clone(),
        visit_start,
        visit_end,
        event_count: cluster.len(),
        // num_seconds truncates; the span is never negative here.
        duration_seconds: (visit_end - visit_start).num_seconds(),
    })
}
