//! Sensor that replays a fixed sequence of readings.
//!
//! Used for dry runs without hardware and throughout the test suite.

use crate::collector::{MotionSensor, SensorError};
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

/// How long an exhausted script idles per wait.
const EXHAUSTED_IDLE: Duration = Duration::from_millis(1);

/// A sensor fed from a queue of readings (`true` = motion).
///
/// Each read consumes one reading. Once the queue is empty the sensor
/// reports idle, or fails if built with [`ScriptedSensor::fail_when_exhausted`].
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    device_id: String,
    readings: VecDeque<bool>,
    fail_when_exhausted: bool,
}

impl ScriptedSensor {
    pub fn new(device_id: impl Into<String>, readings: impl IntoIterator<Item = bool>) -> Self {
        Self {
            device_id: device_id.into(),
            readings: readings.into_iter().collect(),
            fail_when_exhausted: false,
        }
    }

    /// Turn reads past the end of the script into errors.
    pub fn fail_when_exhausted(mut self) -> Self {
        self.fail_when_exhausted = true;
        self
    }

    /// Number of readings not yet consumed.
    pub fn remaining(&self) -> usize {
        self.readings.len()
    }

    fn next_reading(&mut self) -> Result<Option<bool>, SensorError> {
        match self.readings.pop_front() {
            Some(reading) => Ok(Some(reading)),
            None if self.fail_when_exhausted => {
                Err(SensorError::InvalidValue("script exhausted".to_string()))
            }
            None => Ok(None),
        }
    }

    fn wait_for_state(&mut self, target: bool, timeout: Duration) -> Result<bool, SensorError> {
        loop {
            match self.next_reading()? {
                Some(reading) if reading == target => return Ok(true),
                Some(_) => continue,
                None => {
                    thread::sleep(timeout.min(EXHAUSTED_IDLE));
                    // An exhausted script rests in the idle state.
                    return Ok(!target);
                }
            }
        }
    }
}

impl MotionSensor for ScriptedSensor {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn is_active(&mut self) -> Result<bool, SensorError> {
        Ok(self.next_reading()?.unwrap_or(false))
    }

    fn wait_for_motion(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        self.wait_for_state(true, timeout)
    }

    fn wait_for_no_motion(&mut self, timeout: Duration) -> Result<bool, SensorError> {
        self.wait_for_state(false, timeout)
    }
}
