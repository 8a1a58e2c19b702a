//! Non-Linux (noop) implementation of the motion sensor.
//!
//! This exists so the crate (and binary) can compile on hosts without a
//! sysfs GPIO interface. The sensor never reports motion.

use crate::collector::{device_id_for_pin, MotionSensor, SensorError};
use std::thread;
use std::time::Duration;

/// A sensor that stays idle forever.
pub struct NoopMotionSensor {
    device_id: String,
}

impl NoopMotionSensor {
    pub fn new(pin: u8) -> Self {
        Self {
            device_id: device_id_for_pin(pin),
        }
    }
}

impl MotionSensor for NoopMotionSensor {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn is_active(&mut self) -> Result<bool, SensorError> {
        Ok(false)
    }

    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        thread::sleep(timeout);
        Ok(false)
    }

    fn wait_for_no_motion(&mut self, _timeout: Duration) -> Result<bool, SensorError> {
        Ok(true)
    }
}
