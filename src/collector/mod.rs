//! Motion sensor collection for the bathroom monitor.
//!
//! This module provides the PIR sensor abstraction, platform-specific sensor
//! implementations and the polling loop that turns sensor state changes into
//! motion events.

pub mod detector;
pub mod scripted;
pub mod types;

#[cfg(target_os = "linux")]
pub mod gpio;

#[cfg(not(target_os = "linux"))]
pub mod noop;

use std::time::Duration;
use thiserror::Error;

// Re-export commonly used types
pub use detector::{DetectorConfig, DetectorError, MotionDetector, StabilizationOutcome};
pub use scripted::ScriptedSensor;
pub use types::{EventError, MotionEvent, Visit};

#[cfg(target_os = "linux")]
pub use gpio::GpioMotionSensor;

/// Platform-agnostic sensor type alias
#[cfg(target_os = "linux")]
pub type PlatformSensor = GpioMotionSensor;

#[cfg(not(target_os = "linux"))]
pub use noop::NoopMotionSensor;

/// Platform-agnostic sensor type alias
#[cfg(not(target_os = "linux"))]
pub type PlatformSensor = NoopMotionSensor;

/// Device identifier for a PIR sensor wired to a GPIO pin.
pub fn device_id_for_pin(pin: u8) -> String {
    format!("pir_sensor_GPIO{pin}")
}

/// Errors raised while reading a sensor.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read sensor: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected sensor value {0:?}")]
    InvalidValue(String),
}

/// A binary motion sensor.
///
/// Waits are bounded so callers can check a stop flag between reads.
pub trait MotionSensor: Send {
    /// Identifier recorded on every event from this sensor.
    fn device_id(&self) -> String;

    /// Current sensor state: `true` while motion is reported.
    fn is_active(&mut self) -> Result<bool, SensorError>;

    /// Block until motion is reported or `timeout` elapses.
    ///
    /// Returns whether motion was reported.
    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool, SensorError>;

    /// Block until the sensor returns to idle or `timeout` elapses.
    ///
    /// Returns whether the sensor is idle.
    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool, SensorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_for_pin() {
        assert_eq!(device_id_for_pin(4), "pir_sensor_GPIO4");
    }
}
