//! Core logic for the bathroom monitor.
//!
//! This module contains:
//! - The fixed-zone clock used for all wall-clock decisions
//! - Nightly window scheduling for detection and reporting
//! - Clustering of motion events into visits
//! - Report aggregation over a night's visits

pub mod clustering;
pub mod report;
pub mod schedule;
pub mod timezone;

// Re-export commonly used types
pub use clustering::{detect_visits, within_window, VisitDetector, DEFAULT_CLUSTER_WINDOW_MINUTES};
pub use report::{generate_report, ReportData};
pub use schedule::{plan_detection, report_window, DetectionPlan, NightWindow, ReportWindow};
pub use timezone::{LocalZone, DEFAULT_FORMAT, DEFAULT_TIMEZONE};
