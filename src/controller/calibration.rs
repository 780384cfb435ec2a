//! # Calibration Module
//!
//! Derives zero offsets for the IMU and stick axes from live samples.
//!
//! ## Process
//!
//! Calibration is split into two pieces:
//!
//! - [`CalibrationSchedule`] yields a finite, restartable countdown of steps.
//!   Every `feedback_every`th step carries a player-light pattern
//!   `(remaining + 1) & 0xF` so the user can see progress.
//! - [`CalibrationAccumulator`] collects the six IMU axes (first sub-sample)
//!   and both stick axes of each sampled state, and reduces every channel to
//!   its truncating integer mean.
//!
//! [`calibrate`] drives the two with a fixed sleep between samples.
//!
//! ## Usage
//!
//! ```
//! use std::time::Duration;
//! use joycon_bridge::controller::calibration::CalibrationSchedule;
//!
//! let schedule = CalibrationSchedule::new(30, Duration::from_millis(100), 5);
//! let patterns: Vec<u8> = schedule.steps().filter_map(|s| s.indicator).collect();
//! assert_eq!(patterns, vec![15, 10, 5, 0, 11, 6]);
//! ```

use std::time::Duration;
use tracing::{debug, info};

use crate::error::{JoyconError, Result};
use crate::protocol::state::{CalibrationOffsets, ControllerState};

/// Default number of samples
pub const DEFAULT_STEPS: u32 = 30;

/// Default pause between samples
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Default progress-light period
pub const DEFAULT_FEEDBACK_EVERY: u32 = 5;

/// Timing policy of a calibration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSchedule {
    steps: u32,
    interval: Duration,
    feedback_every: u32,
}

impl Default for CalibrationSchedule {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            interval: DEFAULT_INTERVAL,
            feedback_every: DEFAULT_FEEDBACK_EVERY,
        }
    }
}

impl CalibrationSchedule {
    /// Creates a schedule
    ///
    /// # Arguments
    ///
    /// * `steps` - Number of samples to take
    /// * `interval` - Sleep before each sample
    /// * `feedback_every` - Light update period in steps. 0 disables feedback.
    #[must_use]
    pub fn new(steps: u32, interval: Duration, feedback_every: u32) -> Self {
        Self {
            steps,
            interval,
            feedback_every,
        }
    }

    #[must_use]
    pub fn steps_count(&self) -> u32 {
        self.steps
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fresh countdown over this schedule
    pub fn steps(&self) -> CalibrationSteps {
        CalibrationSteps {
            remaining: self.steps,
            feedback_every: self.feedback_every,
        }
    }
}

/// One step of a calibration countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationStep {
    /// Steps left including this one (counts down to 1)
    pub remaining: u32,
    /// Player-light pattern to show before sampling, if any
    pub indicator: Option<u8>,
}

/// Countdown iterator produced by [`CalibrationSchedule::steps`]
#[derive(Debug, Clone)]
pub struct CalibrationSteps {
    remaining: u32,
    feedback_every: u32,
}

impl Iterator for CalibrationSteps {
    type Item = CalibrationStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let remaining = self.remaining;
        self.remaining -= 1;

        let indicator = (self.feedback_every != 0 && remaining % self.feedback_every == 0)
            .then(|| ((remaining + 1) & 0x0F) as u8);

        Some(CalibrationStep {
            remaining,
            indicator,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CalibrationSteps {}

/// Averaging reducer over sampled states
#[derive(Debug, Clone, Default)]
pub struct CalibrationAccumulator {
    /// accel x,y,z, gyro x,y,z, stick h,v
    sums: [i64; 8],
    count: i64,
}

impl CalibrationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first IMU sub-sample and the stick of `state`
    pub fn push(&mut self, state: &ControllerState) {
        let imu = state.latest_imu();
        let channels = [
            imu.accel.x,
            imu.accel.y,
            imu.accel.z,
            imu.gyro.x,
            imu.gyro.y,
            imu.gyro.z,
            state.stick.horizontal,
            state.stick.vertical,
        ];
        for (sum, value) in self.sums.iter_mut().zip(channels) {
            *sum += value as i64;
        }
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reduce every channel to its truncating integer mean
    ///
    /// # Errors
    ///
    /// Returns `CalibrationData` when no sample was pushed.
    pub fn finish(&self) -> Result<CalibrationOffsets> {
        if self.count == 0 {
            return Err(JoyconError::CalibrationData);
        }
        let mean = |i: usize| (self.sums[i] / self.count) as i32;

        Ok(CalibrationOffsets {
            accel_x: mean(0),
            accel_y: mean(1),
            accel_z: mean(2),
            gyro_x: mean(3),
            gyro_y: mean(4),
            gyro_z: mean(5),
            stick_h: mean(6),
            stick_v: mean(7),
        })
    }
}

/// Run a calibration pass
///
/// For each step: show the step's light pattern if it has one, sleep for the
/// schedule interval, then read and record a fresh state.
///
/// # Arguments
///
/// * `schedule` - Step count and timing
/// * `read_state` - Returns a freshly decoded state (raw, without offsets)
/// * `set_indicator` - Shows a player-light pattern
///
/// # Errors
///
/// Propagates errors from either callback, and returns `CalibrationData`
/// for an empty schedule.
pub fn calibrate<R, S>(
    schedule: &CalibrationSchedule,
    mut read_state: R,
    mut set_indicator: S,
) -> Result<CalibrationOffsets>
where
    R: FnMut() -> Result<ControllerState>,
    S: FnMut(u8) -> Result<()>,
{
    info!("Calibration started ({} samples)", schedule.steps_count());
    let mut accumulator = CalibrationAccumulator::new();

    for step in schedule.steps() {
        if let Some(pattern) = step.indicator {
            debug!("Calibration progress: {} steps left", step.remaining);
            set_indicator(pattern)?;
        }
        if !schedule.interval.is_zero() {
            std::thread::sleep(schedule.interval);
        }
        accumulator.push(&read_state()?);
    }

    let offsets = accumulator.finish()?;
    info!("Calibration finished: {:?}", offsets);
    Ok(offsets)
}
