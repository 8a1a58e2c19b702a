//! Bathroom Monitor - overnight PIR motion monitoring with a daily report.
//!
//! A passive infrared sensor records motion events during a nightly window.
//! The next morning the events are grouped into bathroom visits, summarized,
//! and emailed to caregivers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Bathroom Monitor                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐                           │
//! │  │  Collector  │──▶│ EventStore  │   (detection job, nightly) │
//! │  │ (PIR/GPIO)  │   │  (SQLite)   │                           │
//! │  └─────────────┘   └─────────────┘                           │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │ Clustering  │──▶│   Report    │──▶│   Notify    │         │
//! │  │  (visits)   │   │ (summary)   │   │   (SMTP)    │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All wall-clock decisions (window edges, hourly buckets, "today") are made
//! in one configured zone, never the host's.
//!
//! # Example
//!
//! ```no_run
//! use bathroom_monitor::{detect_visits, generate_report, EventStore, LocalZone};
//! use chrono::Utc;
//!
//! let store = EventStore::open("motion_events.db").expect("open store");
//! let zone = LocalZone::default();
//! let start = zone.today_at(0, 30, 0).expect("valid time");
//! let end = zone.today_at(8, 0, 0).expect("valid time");
//!
//! let events = store
//!     .list_events(start.with_timezone(&Utc), end.with_timezone(&Utc))
//!     .expect("load events");
//! let visits = detect_visits(&events, 5);
//! let report = generate_report(&visits, zone.today(), &zone);
//! println!("{} visits", report.total_visits);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod jobs;
pub mod notify;
pub mod store;

// Re-export key types at crate root for convenience
pub use collector::{MotionDetector, MotionEvent, MotionSensor, SensorError, Visit};
pub use config::{Config, ConfigError, SmtpConfig};
pub use core::{
    detect_visits, generate_report, plan_detection, report_window, DetectionPlan, LocalZone,
    NightWindow, ReportData, ReportWindow, VisitDetector,
};
pub use notify::{MailError, Mailer, ReportMailer, SmtpMailer};
pub use store::{EventStore, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
