//! Configuration for the bathroom monitor.
//!
//! Settings are read from a JSON file in the user's config directory and can
//! be overridden by environment variables (a `.env` file is honored by the
//! binary).

use crate::core::clustering::DEFAULT_CLUSTER_WINDOW_MINUTES;
use crate::core::schedule::NightWindow;
use crate::core::timezone::{LocalZone, DEFAULT_TIMEZONE};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA name of the zone all wall-clock times are read in
    pub timezone: String,

    /// Local time the nightly window opens
    #[serde(with = "hhmm")]
    pub monitor_start: NaiveTime,

    /// Local time the nightly window closes and detection stops
    #[serde(with = "hhmm")]
    pub monitor_end: NaiveTime,

    /// Local time the report job is scheduled
    #[serde(with = "hhmm")]
    pub report_time: NaiveTime,

    /// Motion events starting within this many minutes of a visit's first
    /// event belong to that visit
    pub cluster_window_minutes: u32,

    /// BCM pin the PIR sensor is wired to
    pub gpio_pin: u8,

    /// SQLite database holding events and visits
    pub database_path: PathBuf,

    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bathroom-monitor");
        let window = NightWindow::default();

        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            monitor_start: window.start,
            monitor_end: window.end,
            report_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(window.end),
            cluster_window_minutes: DEFAULT_CLUSTER_WINDOW_MINUTES,
            gpio_pin: 4,
            database_path: data_dir.join("motion_events.db"),
            smtp: SmtpConfig::default(),
        }
    }
}

/// Outgoing mail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    /// Sender address, also used as the SMTP login
    pub email_address: String,
    pub password: String,
    /// Report recipients; empty disables sending
    pub recipients: Vec<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            email_address: String::new(),
            password: String::new(),
            recipients: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content).map_err(ConfigError::Parse)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the config file, then apply overrides from the process environment.
    pub fn load_with_env() -> Result<Self, ConfigError> {
        let mut config = Self::load()?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bathroom-monitor")
            .join("config.json")
    }

    /// Ensure the database directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Apply overrides from `lookup`, typically the process environment.
    ///
    /// Empty values are ignored.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(tz) = get("MONITOR_TIMEZONE") {
            self.timezone = tz.trim().to_string();
        }
        if let Some(v) = get("MOTION_START_TIME") {
            self.monitor_start = parse_env_time("MOTION_START_TIME", &v)?;
        }
        if let Some(v) = get("MOTION_END_TIME") {
            self.monitor_end = parse_env_time("MOTION_END_TIME", &v)?;
        }
        if let Some(v) = get("REPORT_TIME") {
            self.report_time = parse_env_time("REPORT_TIME", &v)?;
        }
        if let Some(v) = get("CLUSTER_WINDOW_MINUTES") {
            self.cluster_window_minutes = parse_env_number("CLUSTER_WINDOW_MINUTES", &v)?;
        }
        if let Some(v) = get("SENSOR_GPIO_PIN") {
            self.gpio_pin = parse_env_number("SENSOR_GPIO_PIN", &v)?;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.database_path = PathBuf::from(v.trim());
        }
        if let Some(v) = get("SMTP_SERVER") {
            self.smtp.server = v.trim().to_string();
        }
        if let Some(v) = get("SMTP_PORT") {
            self.smtp.port = parse_env_number("SMTP_PORT", &v)?;
        }
        if let Some(v) = get("EMAIL_ADDRESS") {
            self.smtp.email_address = v.trim().to_string();
        }
        if let Some(v) = get("EMAIL_PASSWORD") {
            self.smtp.password = v;
        }
        if let Some(v) = get("REPORT_EMAIL") {
            self.smtp.recipients = parse_recipients(&v);
        }
        Ok(())
    }

    /// The configured zone.
    pub fn zone(&self) -> Result<LocalZone, ConfigError> {
        LocalZone::from_name(&self.timezone)
            .ok_or_else(|| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn night_window(&self) -> NightWindow {
        NightWindow::new(self.monitor_start, self.monitor_end)
    }

    /// Check settings every job depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zone()?;
        if self.cluster_window_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLUSTER_WINDOW_MINUTES",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Whether any report recipients are configured.
    pub fn email_enabled(&self) -> bool {
        !self.smtp.recipients.is_empty()
    }

    /// Fail when recipients are configured but the sender cannot log in.
    pub fn validate_email(&self) -> Result<(), ConfigError> {
        if !self.email_enabled() {
            return Ok(());
        }
        let mut missing = Vec::new();
        if self.smtp.email_address.trim().is_empty() {
            missing.push("EMAIL_ADDRESS");
        }
        if self.smtp.password.is_empty() {
            missing.push("EMAIL_PASSWORD");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEmailSettings(missing.join(", ")))
        }
    }

    /// Copy of the configuration safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.smtp.password.is_empty() {
            copy.smtp.password = "********".to_string();
        }
        copy
    }
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `HH:MM` (or `HH:MM:SS`) as a wall-clock time.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn parse_env_time(key: &'static str, raw: &str) -> Result<NaiveTime, ConfigError> {
    parse_time(raw).ok_or_else(|| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

fn parse_env_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("report recipients are configured but {0} is not set")]
    MissingEmailSettings(String),
}

/// Serde support for `HH:MM` times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).ok_or_else(|| D::Error::custom(format!("invalid time {raw:?}")))
    }
}
