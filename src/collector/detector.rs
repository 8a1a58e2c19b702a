//! Motion polling loop.
//!
//! The detector owns a [`MotionSensor`] and, once started, polls it on a
//! background thread. Every completed motion interval becomes a
//! [`MotionEvent`] sent over a bounded channel. Stopping is cooperative: the
//! shared `running` flag is checked between bounded sensor waits, so a stop
//! request takes effect once the in-flight wait returns.

use crate::collector::types::MotionEvent;
use crate::collector::{MotionSensor, SensorError};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Timing parameters for the detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Longest single sensor wait before the stop flag is rechecked
    pub poll_slice: Duration,
    /// Delay between readings while waiting for the sensor to settle
    pub settle_interval: Duration,
    /// Identical consecutive readings required before the sensor counts as settled
    pub settle_readings: usize,
    /// Give up waiting for the sensor to settle after this long
    pub settle_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_slice: Duration::from_millis(100),
            settle_interval: Duration::from_millis(100),
            settle_readings: 5,
            settle_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of waiting for the sensor to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizationOutcome {
    /// The sensor produced enough identical readings in a row
    Stable,
    /// The timeout elapsed first; detection proceeds anyway
    TimedOut,
}

/// Errors that can occur while driving the detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Sensor(#[from] SensorError),
}

/// Polls a motion sensor and emits completed motion intervals.
pub struct MotionDetector<S: MotionSensor + 'static> {
    sensor: Option<S>,
    device_id: String,
    config: DetectorConfig,
    sender: Sender<MotionEvent>,
    receiver: Receiver<MotionEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl<S: MotionSensor + 'static> MotionDetector<S> {
    pub fn new(sensor: S, config: DetectorConfig) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(10_000);

        Self {
            device_id: sensor.device_id(),
            sensor: Some(sensor),
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Wait until the sensor gives a steady reading.
    ///
    /// PIR sensors can flicker for a few seconds after power-up. Readings are
    /// taken every `settle_interval`; the sensor is settled once
    /// `settle_readings` consecutive readings agree. After `settle_timeout`
    /// detection proceeds regardless.
    pub fn wait_for_sensor_ready(&mut self) -> Result<StabilizationOutcome, DetectorError> {
        let sensor = self.sensor.as_mut().ok_or(DetectorError::AlreadyRunning)?;
        tracing::info!(device_id = %self.device_id, "checking sensor status");

        let started = Instant::now();
        let mut last: Option<bool> = None;
        let mut streak = 0usize;

        loop {
            let reading = sensor.is_active()?;
            if last == Some(reading) {
                streak += 1;
            } else {
                last = Some(reading);
                streak = 1;
            }

            if streak >= self.config.settle_readings {
                tracing::info!(active = reading, "sensor is ready");
                return Ok(StabilizationOutcome::Stable);
            }
            if started.elapsed() >= self.config.settle_timeout {
                tracing::warn!("sensor stabilization timeout reached, proceeding anyway");
                return Ok(StabilizationOutcome::TimedOut);
            }
            thread::sleep(self.config.settle_interval);
        }
    }

    /// Start polling on a background thread.
    pub fn start(&mut self) -> Result<(), DetectorError> {
        let mut sensor = self.sensor.take().ok_or(DetectorError::AlreadyRunning)?;

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let poll_slice = self.config.poll_slice;

        let handle = thread::spawn(move || {
            match run_polling_loop(&mut sensor, &sender, &running, poll_slice) {
                Ok(count) => tracing::info!(events = count, "motion polling stopped"),
                Err(e) => tracing::error!(error = %e, "motion polling failed"),
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Request a stop and wait for the polling thread to finish.
    ///
    /// A motion interval still in progress is discarded.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The thread exits once its current sensor wait returns
            let _ = handle.join();
        }
    }

    /// Check if the polling thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared flag that keeps the polling loop alive; store `false` to stop it.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Get the receiver for completed motion events.
    pub fn receiver(&self) -> &Receiver<MotionEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<MotionEvent> {
        self.receiver.try_recv().ok()
    }
}

impl<S: MotionSensor + 'static> Drop for MotionDetector<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture events until `running` is cleared or the receiver goes away.
///
/// Returns the number of events emitted.
pub fn run_polling_loop<S: MotionSensor>(
    sensor: &mut S,
    sender: &Sender<MotionEvent>,
    running: &AtomicBool,
    poll_slice: Duration,
) -> Result<u64, SensorError> {
    let mut count = 0;
    while running.load(Ordering::SeqCst) {
        if let Some(event) = capture_motion_event(sensor, running, poll_slice)? {
            tracing::debug!(
                start = %event.start_timestamp,
                stop = %event.stop_timestamp,
                "motion event captured"
            );
            if sender.send(event).is_err() {
                break;
            }
            count += 1;
        }
    }
    Ok(count)
}

/// Wait for one full motion interval.
///
/// Returns `None` if `running` is cleared before the interval completes.
pub fn capture_motion_event<S: MotionSensor>(
    sensor: &mut S,
    running: &AtomicBool,
    poll_slice: Duration,
) -> Result<Option<MotionEvent>, SensorError> {
    if !wait_until(running, || sensor.wait_for_motion(poll_slice))? {
        return Ok(None);
    }
    let start = Utc::now();

    if !wait_until(running, || sensor.wait_for_no_motion(poll_slice))? {
        return Ok(None);
    }
    // Guard against the wall clock stepping backwards mid-interval.
    let stop = Utc::now().max(start);

    match MotionEvent::new(sensor.device_id(), start, stop) {
        Ok(event) => Ok(Some(event)),
        Err(_) => Ok(None),
    }
}

/// Repeat a bounded wait until it succeeds or `running` is cleared.
fn wait_until(
    running: &AtomicBool,
    mut wait: impl FnMut() -> Result<bool, SensorError>,
) -> Result<bool, SensorError> {
    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let reached = wait()?;
        if !running.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if reached {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::scripted::ScriptedSensor;

    fn fast_config() -> DetectorConfig {
        DetectorConfig {
            poll_slice: Duration::from_millis(5),
            settle_interval: Duration::ZERO,
            settle_readings: 5,
            settle_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_capture_complete_motion_event() {
        let mut sensor = ScriptedSensor::new("pir_sensor_GPIO4", [false, true, true, false]);
        let running = AtomicBool::new(true);

        let event = capture_motion_event(&mut sensor, &running, Duration::from_millis(5))
            .unwrap()
            .unwrap();
        assert_eq!(event.device_id, "pir_sensor_GPIO4");
        assert!(event.stop_timestamp >= event.start_timestamp);
    }

    #[test]
    fn test_capture_returns_none_when_stopped() {
        let mut sensor = ScriptedSensor::new("pir_sensor_GPIO4", [true, false]);
        let running = AtomicBool::new(false);

        let event = capture_motion_event(&mut sensor, &running, Duration::from_millis(5)).unwrap();
        assert!(event.is_none());
        // The sensor was never consulted.
        assert_eq!(sensor.remaining(), 2);
    }

    #[test]
    fn test_polling_loop_emits_each_interval() {
        let mut sensor =
            ScriptedSensor::new("pir_sensor_GPIO4", [true, false, false, true, false, false]);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let (sender, receiver) = bounded(16);

        let worker = thread::spawn(move || {
            run_polling_loop(&mut sensor, &sender, &flag, Duration::from_millis(5))
        });
        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);

        // Once the script runs out the sensor stays idle.
        assert_eq!(worker.join().unwrap().unwrap(), 2);
        assert_eq!(receiver.try_iter().count(), 2);
    }

    #[test]
    fn test_polling_loop_propagates_sensor_errors() {
        let mut sensor = ScriptedSensor::new("pir_sensor_GPIO4", [true]).fail_when_exhausted();
        let running = AtomicBool::new(true);
        let (sender, _receiver) = bounded(16);

        let result = run_polling_loop(&mut sensor, &sender, &running, Duration::from_millis(5));
        assert!(result.is_err());
    }

    #[test]
    fn test_sensor_ready_when_stable() {
        let sensor = ScriptedSensor::new("pir_sensor_GPIO4", [false; 5]);
        let mut detector = MotionDetector::new(sensor, fast_config());

        assert_eq!(
            detector.wait_for_sensor_ready().unwrap(),
            StabilizationOutcome::Stable
        );
    }

    #[test]
    fn test_sensor_ready_times_out_when_flickering() {
        let readings: Vec<bool> = (0..10_000).map(|i| i % 2 == 0).collect();
        let sensor = ScriptedSensor::new("pir_sensor_GPIO4", readings);
        let mut config = fast_config();
        config.settle_interval = Duration::from_millis(1);
        let mut detector = MotionDetector::new(sensor, config);

        assert_eq!(
            detector.wait_for_sensor_ready().unwrap(),
            StabilizationOutcome::TimedOut
        );
    }

    #[test]
    fn test_detector_start_and_stop() {
        let sensor = ScriptedSensor::new("pir_sensor_GPIO4", [true, false, true, false]);
        let mut detector = MotionDetector::new(sensor, fast_config());
        assert_eq!(detector.device_id(), "pir_sensor_GPIO4");

        detector.start().unwrap();
        assert!(matches!(detector.start(), Err(DetectorError::AlreadyRunning)));
        assert!(matches!(
            detector.wait_for_sensor_ready(),
            Err(DetectorError::AlreadyRunning)
        ));

        thread::sleep(Duration::from_millis(100));
        detector.stop();
        assert!(!detector.is_running());

        let events: Vec<MotionEvent> = detector.receiver().try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].start_timestamp <= events[1].start_timestamp);
    }

    #[test]
    fn test_running_flag_stops_detector() {
        let sensor = ScriptedSensor::new("pir_sensor_GPIO4", Vec::<bool>::new());
        let mut detector = MotionDetector::new(sensor, fast_config());
        detector.start().unwrap();

        detector.running_flag().store(false, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert!(!detector.is_running());
        assert!(detector.try_recv().is_none());
    }
}
