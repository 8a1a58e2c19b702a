//! Report rendering and email delivery.

pub mod email;
pub mod html;

pub use email::{
    DeliveryOutcome, MailError, Mailer, RecordingMailer, ReportMailer, SentMail, SmtpMailer,
};
pub use html::{format_time_display, render_report_html, report_subject, ReportContext};
