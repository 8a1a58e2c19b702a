//! Report delivery over SMTP.
//!
//! Delivery failures never abort a job: each recipient gets a boolean
//! outcome and the cause is logged.

use crate::config::SmtpConfig;
use crate::core::report::ReportData;
use crate::notify::html::{render_report_html, report_subject, ReportContext};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while building or sending a message.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Something that can deliver an HTML message to one recipient.
pub trait Mailer {
    fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// SMTP delivery with STARTTLS and password authentication.
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(
        server: &str,
        port: u16,
        address: &str,
        password: &str,
    ) -> Result<Self, MailError> {
        let from: Mailbox = address.parse()?;
        let transport = SmtpTransport::starttls_relay(server)?
            .port(port)
            .credentials(Credentials::new(address.to_string(), password.to_string()))
            .build();
        Ok(Self { from, transport })
    }

    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        Self::new(
            &config.server,
            config.port,
            &config.email_address,
            &config.password,
        )
    }
}

impl Mailer for SmtpMailer {
    fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;
        self.transport.send(&message)?;
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mailer that records messages instead of sending them.
///
/// Recipients registered with [`RecordingMailer::failing_for`] are rejected.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Vec<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, recipient: impl Into<String>) -> Self {
        self.failing.push(recipient.into());
        self
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<SentMail> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Mailer for RecordingMailer {
    fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        if self.failing.iter().any(|r| r == to) {
            return Err(MailError::Rejected(to.to_string()));
        }
        let mail = SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        };
        match self.sent.lock() {
            Ok(mut sent) => sent.push(mail),
            Err(poisoned) => poisoned.into_inner().push(mail),
        }
        Ok(())
    }
}

impl<M: Mailer + ?Sized> Mailer for &M {
    fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        (**self).send_html(to, subject, html)
    }
}

/// Delivery result for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub delivered: bool,
}

/// Renders reports and hands them to a [`Mailer`].
pub struct ReportMailer<M: Mailer> {
    mailer: M,
    context: ReportContext,
}

impl<M: Mailer> ReportMailer<M> {
    pub fn new(mailer: M, context: ReportContext) -> Self {
        Self { mailer, context }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Send `report` to one recipient. Returns whether delivery succeeded.
    pub fn send_report(&self, recipient: &str, report: &ReportData) -> bool {
        let subject = report_subject(report.report_date);
        let html = render_report_html(report, &self.context);

        match self.mailer.send_html(recipient, &subject, &html) {
            Ok(()) => {
                tracing::info!(recipient, "report sent");
                true
            }
            Err(e) => {
                tracing::error!(recipient, error = %e, "failed to send report");
                false
            }
        }
    }

    /// Send `report` to every recipient independently.
    pub fn send_to_all(&self, recipients: &[String], report: &ReportData) -> Vec<DeliveryOutcome> {
        recipients
            .iter()
            .map(|recipient| DeliveryOutcome {
                recipient: recipient.clone(),
                delivered: self.send_report(recipient, report),
            })
            .collect()
    }
}
