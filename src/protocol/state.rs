//! # Decoded Controller State
//!
//! Typed snapshot produced from one input report. A [`ControllerState`] is
//! never updated in place; every query decodes a fresh one.

use serde::{Deserialize, Serialize};

use crate::error::{JoyconError, Result};
use super::report::IMU_SAMPLES_PER_REPORT;

/// Which half of the controller pair a device is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Identity of one physical controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerIdentity {
    pub side: Side,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl ControllerIdentity {
    pub const fn new(side: Side, vendor_id: u16, product_id: u16) -> Self {
        Self {
            side,
            vendor_id,
            product_id,
        }
    }

    /// Human-readable name, e.g. "Joycon Left"
    pub fn name(&self) -> &'static str {
        match self.side {
            Side::Left => "Joycon Left",
            Side::Right => "Joycon Right",
        }
    }
}

/// Per-axis zero offsets subtracted from raw readings at decode time
///
/// Battery and buttons are never offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationOffsets {
    pub accel_x: i32,
    pub accel_y: i32,
    pub accel_z: i32,
    pub gyro_x: i32,
    pub gyro_y: i32,
    pub gyro_z: i32,
    pub stick_h: i32,
    pub stick_v: i32,
}

/// Battery nibble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Battery {
    pub charging: bool,
    /// 0..=7
    pub level: u8,
    #[serde(rename = "charging-grip")]
    pub charging_grip: bool,
}

/// Analog stick position after offset subtraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stick {
    pub horizontal: i32,
    pub vertical: i32,
}

/// Three-axis reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Vector3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One accelerometer + gyroscope sub-sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImuSample {
    pub accel: Vector3,
    pub gyro: Vector3,
}

/// Buttons present on the left controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeftButtons {
    pub down: bool,
    pub up: bool,
    pub right: bool,
    pub left: bool,
    pub sr: bool,
    pub sl: bool,
    pub l: bool,
    pub zl: bool,
    pub minus: bool,
    #[serde(rename = "l-stick")]
    pub stick: bool,
    pub capture: bool,
}

/// Buttons present on the right controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RightButtons {
    pub y: bool,
    pub x: bool,
    pub b: bool,
    pub a: bool,
    pub sr: bool,
    pub sl: bool,
    pub r: bool,
    pub zr: bool,
    pub plus: bool,
    #[serde(rename = "r-stick")]
    pub stick: bool,
    pub home: bool,
}

/// Side-specific button set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Buttons {
    Left(LeftButtons),
    Right(RightButtons),
}

impl Buttons {
    /// True when any button is held
    pub fn any_pressed(&self) -> bool {
        match self {
            Buttons::Left(b) => {
                b.down || b.up || b.right || b.left || b.sr || b.sl || b.l || b.zl
                    || b.minus || b.stick || b.capture
            }
            Buttons::Right(b) => {
                b.y || b.x || b.b || b.a || b.sr || b.sl || b.r || b.zr
                    || b.plus || b.stick || b.home
            }
        }
    }
}

/// Validated IMU sub-sample index (0, 1 or 2)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleIndex(usize);

impl SampleIndex {
    /// # Errors
    ///
    /// Returns `OutOfRange` for any index past the last sub-sample.
    pub fn new(index: usize) -> Result<Self> {
        if index < IMU_SAMPLES_PER_REPORT {
            Ok(Self(index))
        } else {
            Err(JoyconError::OutOfRange {
                index: index as i64,
            })
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<i64> for SampleIndex {
    type Error = JoyconError;

    fn try_from(index: i64) -> Result<Self> {
        usize::try_from(index)
            .map_err(|_| JoyconError::OutOfRange { index })
            .and_then(Self::new)
    }
}

/// Group names used when a state is serialized
pub const STATUS_GROUPS: [&str; 4] = ["battery", "buttons", "analog-sticks", "imu"];

/// Decoded snapshot of one input report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    pub battery: Battery,
    pub buttons: Buttons,
    #[serde(rename = "analog-sticks")]
    pub stick: Stick,
    pub imu: [ImuSample; IMU_SAMPLES_PER_REPORT],
}

impl ControllerState {
    /// IMU sub-sample at `index`
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` unless `index` is 0, 1 or 2.
    pub fn imu_sample(&self, index: usize) -> Result<&ImuSample> {
        let index = SampleIndex::new(index)?;
        Ok(&self.imu[index.get()])
    }

    /// First sub-sample, the one calibration and status output use
    pub fn latest_imu(&self) -> &ImuSample {
        &self.imu[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_state(side: Side) -> ControllerState {
        ControllerState {
            battery: Battery::default(),
            buttons: match side {
                Side::Left => Buttons::Left(LeftButtons::default()),
                Side::Right => Buttons::Right(RightButtons::default()),
            },
            stick: Stick::default(),
            imu: [ImuSample::default(); IMU_SAMPLES_PER_REPORT],
        }
    }

    #[test]
    fn test_identity_names() {
        assert_eq!(ControllerIdentity::new(Side::Left, 1406, 8198).name(), "Joycon Left");
        assert_eq!(ControllerIdentity::new(Side::Right, 1406, 8199).name(), "Joycon Right");
    }

    #[test]
    fn test_sample_index_valid() {
        for index in 0..3 {
            assert_eq!(SampleIndex::new(index).unwrap().get(), index);
        }
    }

    #[test]
    fn test_sample_index_out_of_range() {
        assert!(matches!(
            SampleIndex::new(3),
            Err(JoyconError::OutOfRange { index: 3 })
        ));
        assert!(matches!(
            SampleIndex::try_from(-1i64),
            Err(JoyconError::OutOfRange { index: -1 })
        ));
        assert!(SampleIndex::try_from(2i64).is_ok());
    }

    #[test]
    fn test_imu_sample_getter() {
        let mut state = zero_state(Side::Right);
        state.imu[2].gyro.z = -7;
        assert_eq!(state.imu_sample(2).unwrap().gyro.z, -7);
        assert!(state.imu_sample(3).is_err());
    }

    #[test]
    fn test_any_pressed() {
        let mut state = zero_state(Side::Left);
        assert!(!state.buttons.any_pressed());
        state.buttons = Buttons::Left(LeftButtons {
            zl: true,
            ..LeftButtons::default()
        });
        assert!(state.buttons.any_pressed());
    }

    #[test]
    fn test_state_serializes_with_group_names() {
        let state = zero_state(Side::Left);
        let json = serde_json::to_value(state).unwrap();
        for group in STATUS_GROUPS {
            assert!(json.get(group).is_some(), "missing group {}", group);
        }
        assert_eq!(json["buttons"]["l-stick"], false);
        assert_eq!(json["battery"]["charging-grip"], false);
        assert_eq!(json["imu"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Left.to_string(), "left");
        assert_eq!(Side::Right.to_string(), "right");
    }
}
