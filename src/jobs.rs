//! The two scheduled jobs: overnight detection and the morning report.

use crate::collector::{MotionDetector, MotionSensor, StabilizationOutcome};
use crate::config::Config;
use crate::core::clustering::VisitDetector;
use crate::core::report::{generate_report, ReportData};
use crate::core::schedule::{report_window, DetectionPlan, ReportWindow};
use crate::core::timezone::LocalZone;
use crate::notify::{DeliveryOutcome, Mailer, ReportContext, ReportMailer};
use crate::store::EventStore;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use crossbeam_channel::RecvTimeoutError;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How often the detection loop wakes to check its deadline and stop flag.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// What a detection run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSummary {
    pub stabilization: StabilizationOutcome,
    pub events_saved: u64,
    /// Events that could not be written to the store
    pub events_failed: u64,
    /// Whether the run ended because the stop flag was cleared
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// How long a detection run following `plan` may last.
pub fn detection_limit(plan: &DetectionPlan) -> Duration {
    Duration::from_secs(plan.duration_secs.max(0) as u64)
}

/// Run motion detection until `limit` elapses or `keep_running` is cleared.
///
/// With no limit the run lasts until `keep_running` is cleared. Events are
/// written to `store` as they arrive; a store failure is logged and the run
/// continues.
pub fn run_detection<S: MotionSensor + 'static>(
    detector: &mut MotionDetector<S>,
    store: &EventStore,
    limit: Option<Duration>,
    keep_running: &AtomicBool,
) -> anyhow::Result<DetectionSummary> {
    let span = tracing::info_span!("detection_job", run_id = %Uuid::new_v4());
    let _guard = span.enter();

    let started = Instant::now();
    tracing::info!(
        device_id = detector.device_id(),
        limit_secs = limit.map(|l| l.as_secs()),
        "starting motion detection"
    );

    let stabilization = detector
        .wait_for_sensor_ready()
        .context("failed to read sensor while waiting for it to settle")?;
    detector.start().context("failed to start motion polling")?;

    let receiver = detector.receiver().clone();
    let mut summary = DetectionSummary {
        stabilization,
        events_saved: 0,
        events_failed: 0,
        interrupted: false,
        elapsed: Duration::ZERO,
    };

    loop {
        if !keep_running.load(Ordering::SeqCst) {
            summary.interrupted = true;
            tracing::info!("stop requested");
            break;
        }
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            tracing::info!("monitoring window ended");
            break;
        }
        if !detector.is_running() {
            tracing::warn!("motion polling ended early");
            break;
        }

        match receiver.recv_timeout(RECEIVE_TIMEOUT) {
            Ok(event) => persist_event(store, &event, &mut summary),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("detector disconnected unexpectedly");
                break;
            }
        }
    }

    detector.stop();
    while let Some(event) = detector.try_recv() {
        persist_event(store, &event, &mut summary);
    }

    summary.elapsed = started.elapsed();
    tracing::info!(
        events_saved = summary.events_saved,
        events_failed = summary.events_failed,
        "motion detection finished"
    );
    Ok(summary)
}

fn persist_event(
    store: &EventStore,
    event: &crate::collector::MotionEvent,
    summary: &mut DetectionSummary,
) {
    match store.add_event(event) {
        Ok(id) => {
            summary.events_saved += 1;
            tracing::debug!(
                id,
                start = %event.start_timestamp,
                stop = %event.stop_timestamp,
                "motion event saved"
            );
        }
        Err(e) => {
            summary.events_failed += 1;
            tracing::error!(error = %e, "failed to save motion event");
        }
    }
}

/// What a report run produced.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub window: ReportWindow,
    pub events_analyzed: usize,
    /// Visits newly written to the store (re-runs skip existing ones)
    pub visits_saved: usize,
    pub report: ReportData,
    pub deliveries: Vec<DeliveryOutcome>,
}

/// Analyze the night of `date` and email the report.
///
/// Pass `None` for `mailer` to skip delivery. When a mailer is given the
/// email settings are validated before any work is done; an empty recipient
/// list only disables sending.
pub fn run_report(
    config: &Config,
    store: &mut EventStore,
    mailer: Option<&dyn Mailer>,
    date: NaiveDate,
) -> anyhow::Result<ReportOutcome> {
    let span = tracing::info_span!("report_job", run_id = %Uuid::new_v4(), %date);
    let _guard = span.enter();

    config.validate()?;
    if mailer.is_some() {
        config.validate_email()?;
        if !config.email_enabled() {
            tracing::warn!("no report recipients configured, email disabled");
        }
    }

    let zone = config.zone()?;
    let window = report_window(&zone, date, &config.night_window());
    tracing::info!(
        start = %zone.format_default(&window.start),
        end = %zone.format_default(&window.end),
        "generating report"
    );

    let events = store
        .list_events(window.start.with_timezone(&Utc), window.end.with_timezone(&Utc))
        .context("failed to load motion events")?;
    let visits = VisitDetector::new(config.cluster_window_minutes).detect(&events);
    tracing::info!(events = events.len(), visits = visits.len(), "visits detected");

    let visits_saved = store
        .add_visits(&visits, Utc::now())
        .context("failed to save visits")?;

    let report = generate_report(&visits, date, &zone);

    let deliveries = match mailer {
        Some(mailer) if config.email_enabled() => {
            let context = ReportContext::new(zone, config.night_window());
            ReportMailer::new(mailer, context).send_to_all(&config.smtp.recipients, &report)
        }
        _ => Vec::new(),
    };

    Ok(ReportOutcome {
        window,
        events_analyzed: events.len(),
        visits_saved,
        report,
        deliveries,
    })
}

/// Human-readable summary of a report for the console.
pub fn format_report_summary(report: &ReportData, zone: &LocalZone) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bathroom report for {}", report.report_date);
    let _ = writeln!(out, "  Total visits: {}", report.total_visits);

    if report.total_visits == 0 {
        let _ = writeln!(out, "  No bathroom visits detected.");
        return out;
    }

    let _ = writeln!(
        out,
        "  Average duration: {:.1} min",
        report.avg_duration_minutes()
    );
    let _ = writeln!(out, "  Total time: {:.1} min", report.total_time_minutes());
    if let Some(longest) = &report.longest_visit {
        let _ = writeln!(
            out,
            "  Longest visit: {:.1} min at {}",
            longest.duration_minutes(),
            zone.format(&longest.visit_start, "%H:%M")
        );
    }
    if let Some((hour, count)) = report.peak_hour() {
        let _ = writeln!(out, "  Peak hour: {hour:02}:00 ({count} visits)");
    }
    out
}
