//! Linux implementation of the PIR sensor using the sysfs GPIO interface.
//!
//! The pin must already be exported and configured as an input, e.g.
//! `echo 4 > /sys/class/gpio/export`. The value file reads `1` while the
//! sensor reports motion.

use crate::collector::{device_id_for_pin, MotionSensor, SensorError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Default interval between value reads while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A PIR sensor read through a sysfs GPIO value file.
pub struct GpioMotionSensor {
    device_id: String,
    value_path: PathBuf,
    poll_interval: Duration,
}

impl GpioMotionSensor {
    /// Create a sensor for the given BCM pin number.
    pub fn new(pin: u8) -> Self {
        Self::with_value_path(
            device_id_for_pin(pin),
            PathBuf::from(format!("/sys/class/gpio/gpio{pin}/value")),
        )
    }

    /// Create a sensor reading from an explicit value file.
    pub fn with_value_path(device_id: impl Into<String>, value_path: impl Into<PathBuf>) -> Self {
        Self {
            device_id: device_id.into(),
            value_path: value_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn value_path(&self) -> &Path {
        &self.value_path
    }

    /// Poll until the sensor reports `target` or `timeout` elapses.
    fn wait_for_state(&mut self, target: bool, timeout: Duration) -> Result<bool, SensorError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_active()? == target {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

/// Parse the contents of a sysfs GPIO value file.
fn parse_value(raw: &str) -> Result<bool, SensorError> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(SensorError::InvalidValue(other.to_string())),
    }
}

impl MotionSensor for GpioMotionSensor {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn is_active(&mut self) -> Result<bool, SensorError> {
        let raw = std::fs::read_to_string(&self.value_path)?;
        parse_value(&raw)
    }

    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        self.wait_for_state(true, timeout)
    }

    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        self.wait_for_state(false, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("bathroom-monitor-gpio-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_paths() {
        let sensor = GpioMotionSensor::new(4);
        assert_eq!(sensor.device_id(), "pir_sensor_GPIO4");
        assert_eq!(sensor.value_path(), Path::new("/sys/class/gpio/gpio4/value"));
    }

    #[test]
    fn test_parse_value() {
        assert!(parse_value("1\n").unwrap());
        assert!(!parse_value("0\n").unwrap());
        assert!(matches!(parse_value("x"), Err(SensorError::InvalidValue(_))));
    }

    #[test]
    fn test_reads_value_file() {
        let path = value_file("active", "1\n");
        let mut sensor = GpioMotionSensor::with_value_path("test", &path);

        assert!(sensor.is_active().unwrap());
        assert!(sensor.wait_for_motion(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_wait_times_out() {
        let path = value_file("idle", "0\n");
        let mut sensor = GpioMotionSensor::with_value_path("test", &path)
            .with_poll_interval(Duration::from_millis(5));

        let started = Instant::now();
        assert!(!sensor.wait_for_motion(Duration::from_millis(30)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(sensor.wait_for_no_motion(Duration::from_millis(30)).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut sensor = GpioMotionSensor::with_value_path("test", "/nonexistent/gpio/value");
        assert!(matches!(sensor.is_active(), Err(SensorError::Io(_))));
    }
}
