//! # Input Report Decoder
//!
//! Turns a 49-byte input report into a [`ControllerState`].
//!
//! ## Report Layout
//!
//! ```text
//! Byte 2      : battery level [7:5] | charging [4]
//! Bytes 3-5   : button bits (see `layout`)
//! Bytes 6-8   : left stick, two packed 12-bit axes
//! Bytes 9-11  : right stick, two packed 12-bit axes
//! Bytes 13-48 : three IMU samples, 12 bytes each:
//!               accel x,y,z then gyro x,y,z, all i16 little-endian
//! ```
//!
//! Calibration offsets are subtracted after each value is reconstructed.

use super::layout::ButtonLayout;
use super::report::*;
use super::state::{Battery, CalibrationOffsets, ControllerState, ImuSample, Stick, Vector3};
use crate::error::Result;

/// Decode a raw byte buffer
///
/// # Arguments
///
/// * `raw` - Input report bytes, exactly 49 long
/// * `layout` - Button layout of the controller that produced the report
/// * `offsets` - Calibration offsets to subtract
///
/// # Errors
///
/// Returns `Protocol` if `raw` is not exactly 49 bytes.
///
/// # Examples
///
/// ```
/// use joycon_bridge::protocol::decoder::decode;
/// use joycon_bridge::protocol::layout::ButtonLayout;
/// use joycon_bridge::protocol::state::{CalibrationOffsets, Side};
///
/// let mut raw = [0u8; 49];
/// raw[2] = 0x30;
/// let state = decode(&raw, ButtonLayout::for_side(Side::Left), &CalibrationOffsets::default())?;
/// assert!(state.battery.charging);
/// assert_eq!(state.battery.level, 1);
/// # Ok::<(), joycon_bridge::error::JoyconError>(())
/// ```
pub fn decode(
    raw: &[u8],
    layout: &ButtonLayout,
    offsets: &CalibrationOffsets,
) -> Result<ControllerState> {
    let report = RawReport::from_slice(raw)?;
    Ok(decode_report(&report, layout, offsets))
}

/// Decode an already validated report
pub fn decode_report(
    report: &RawReport,
    layout: &ButtonLayout,
    offsets: &CalibrationOffsets,
) -> ControllerState {
    ControllerState {
        battery: decode_battery(report),
        buttons: layout.buttons(report),
        stick: decode_stick(report, layout.stick_offset, offsets),
        imu: [
            decode_imu_sample(report, 0, offsets),
            decode_imu_sample(report, 1, offsets),
            decode_imu_sample(report, 2, offsets),
        ],
    }
}

pub fn decode_battery(report: &RawReport) -> Battery {
    Battery {
        charging: report.flag(BATTERY_CHARGING),
        level: report.bits(BATTERY_LEVEL),
        charging_grip: report.flag(CHARGING_GRIP),
    }
}

/// Decode the stick triplet at `offset` and subtract the stick offsets
/// from the whole 12-bit axis
pub fn decode_stick(report: &RawReport, offset: usize, offsets: &CalibrationOffsets) -> Stick {
    let (horizontal, vertical) = report.stick_raw(offset);
    Stick {
        horizontal: horizontal as i32 - offsets.stick_h,
        vertical: vertical as i32 - offsets.stick_v,
    }
}

/// Decode IMU sub-sample `index` (0..=2)
///
/// Callers outside this module go through [`SampleIndex`](super::state::SampleIndex)
/// or [`ControllerState::imu_sample`] for range checking.
pub fn decode_imu_sample(report: &RawReport, index: usize, offsets: &CalibrationOffsets) -> ImuSample {
    let base = IMU_OFFSET + index * IMU_SAMPLE_STRIDE;
    let field = |n: usize| report.i16_le(base + n * 2) as i32;

    ImuSample {
        accel: Vector3 {
            x: field(0) - offsets.accel_x,
            y: field(1) - offsets.accel_y,
            z: field(2) - offsets.accel_z,
        },
        gyro: Vector3 {
            x: field(3) - offsets.gyro_x,
            y: field(4) - offsets.gyro_y,
            z: field(5) - offsets.gyro_z,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JoyconError;
    use crate::protocol::layout::{LEFT_LAYOUT, RIGHT_LAYOUT};
    use crate::protocol::state::Buttons;

    fn no_offsets() -> CalibrationOffsets {
        CalibrationOffsets::default()
    }

    /// Deterministic non-trivial report
    fn sample_report() -> [u8; INPUT_REPORT_SIZE] {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        raw
    }

    fn put_i16(raw: &mut [u8; INPUT_REPORT_SIZE], offset: usize, value: u16) {
        raw[offset] = (value & 0xFF) as u8;
        raw[offset + 1] = (value >> 8) as u8;
    }

    // ==================== Length Validation ====================

    #[test]
    fn test_decode_rejects_short_buffer() {
        let result = decode(&[0u8; 48], &LEFT_LAYOUT, &no_offsets());
        assert!(matches!(result, Err(JoyconError::Protocol(_))));
    }

    #[test]
    fn test_decode_rejects_empty_buffer() {
        assert!(decode(&[], &RIGHT_LAYOUT, &no_offsets()).is_err());
    }

    // ==================== Battery ====================

    #[test]
    fn test_decode_battery_0x30() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        raw[2] = 0x30;
        let state = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        assert!(state.battery.charging);
        assert_eq!(state.battery.level, 1);
        assert!(!state.battery.charging_grip);
    }

    #[test]
    fn test_decode_battery_full_not_charging() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        raw[2] = 0x80;
        raw[4] = 0x80;
        let state = decode(&raw, &RIGHT_LAYOUT, &no_offsets()).unwrap();
        assert!(!state.battery.charging);
        assert_eq!(state.battery.level, 4);
        assert!(state.battery.charging_grip);
    }

    #[test]
    fn test_battery_never_offset() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        raw[2] = 0xF0;
        let offsets = CalibrationOffsets {
            accel_x: 99,
            stick_h: 99,
            ..CalibrationOffsets::default()
        };
        let state = decode(&raw, &LEFT_LAYOUT, &offsets).unwrap();
        assert_eq!(state.battery.level, 7);
        assert!(state.battery.charging);
    }

    // ==================== Determinism ====================

    #[test]
    fn test_decode_is_deterministic() {
        let raw = sample_report();
        let offsets = CalibrationOffsets {
            accel_x: 5,
            gyro_z: -3,
            stick_v: 100,
            ..CalibrationOffsets::default()
        };
        for layout in [&LEFT_LAYOUT, &RIGHT_LAYOUT] {
            let first = decode(&raw, layout, &offsets).unwrap();
            let second = decode(&raw, layout, &offsets).unwrap();
            assert_eq!(first, second);
        }
    }

    // ==================== Sticks ====================

    #[test]
    fn test_stick_boundaries() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        let state = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(state.stick, Stick { horizontal: 0, vertical: 0 });

        raw[6] = 0xFF;
        raw[7] = 0xFF;
        raw[8] = 0xFF;
        let state = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(state.stick, Stick { horizontal: 4095, vertical: 4095 });
    }

    #[test]
    fn test_stick_side_selects_triplet() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        // Left: h = 0x800, v = 0x7F0
        raw[6] = 0x00;
        raw[7] = 0x08;
        raw[8] = 0x7F;
        // Right: h = 0x123, v = 0x456
        raw[9] = 0x23;
        raw[10] = 0x61;
        raw[11] = 0x45;

        let left = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(left.stick, Stick { horizontal: 0x800, vertical: 0x7F0 });

        let right = decode(&raw, &RIGHT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(right.stick, Stick { horizontal: 0x123, vertical: 0x456 });
    }

    #[test]
    fn test_stick_offset_applies_to_whole_axis_without_clamping() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        raw[6] = 0x10; // h = 0x010
        raw[7] = 0x00;
        raw[8] = 0x01; // v = 0x010
        let offsets = CalibrationOffsets {
            stick_h: 2048,
            stick_v: 15,
            ..CalibrationOffsets::default()
        };
        let state = decode(&raw, &LEFT_LAYOUT, &offsets).unwrap();
        assert_eq!(state.stick.horizontal, 16 - 2048);
        assert_eq!(state.stick.vertical, 1);
    }

    // ==================== IMU ====================

    #[test]
    fn test_imu_signed_boundaries() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        put_i16(&mut raw, 13, 32767);
        put_i16(&mut raw, 15, 32768);
        put_i16(&mut raw, 17, 65535);
        let state = decode(&raw, &RIGHT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(state.imu[0].accel, Vector3 { x: 32767, y: -32768, z: -1 });
    }

    #[test]
    fn test_imu_sample_stride() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        // gyro z of each sample: 13 + k*12 + 10
        put_i16(&mut raw, 23, 100);
        put_i16(&mut raw, 35, 200);
        put_i16(&mut raw, 47, 300);
        // accel x of sample 1
        put_i16(&mut raw, 25, 0xFFF6);

        let state = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        assert_eq!(state.imu[0].gyro.z, 100);
        assert_eq!(state.imu[1].gyro.z, 200);
        assert_eq!(state.imu[2].gyro.z, 300);
        assert_eq!(state.imu[1].accel.x, -10);
    }

    #[test]
    fn test_imu_offsets_subtracted_uniformly() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        for k in 0..IMU_SAMPLES_PER_REPORT {
            for n in 0..6 {
                put_i16(&mut raw, IMU_OFFSET + k * IMU_SAMPLE_STRIDE + n * 2, 1000);
            }
        }
        let offsets = CalibrationOffsets {
            accel_x: 1,
            accel_y: 2,
            accel_z: 3,
            gyro_x: -4,
            gyro_y: -5,
            gyro_z: 2000,
            stick_h: 0,
            stick_v: 0,
        };
        let state = decode(&raw, &LEFT_LAYOUT, &offsets).unwrap();
        for sample in state.imu {
            assert_eq!(sample.accel, Vector3 { x: 999, y: 998, z: 997 });
            assert_eq!(sample.gyro, Vector3 { x: 1004, y: 1005, z: -1000 });
        }
    }

    #[test]
    fn test_imu_sample_index_range() {
        let state = decode(&sample_report(), &RIGHT_LAYOUT, &no_offsets()).unwrap();
        for index in 0..3 {
            assert!(state.imu_sample(index).is_ok());
        }
        assert!(matches!(
            state.imu_sample(3),
            Err(JoyconError::OutOfRange { index: 3 })
        ));
    }

    // ==================== Buttons ====================

    #[test]
    fn test_buttons_follow_layout() {
        let mut raw = [0u8; INPUT_REPORT_SIZE];
        raw[3] = 0x01; // Y
        raw[5] = 0x80; // ZL
        let left = decode(&raw, &LEFT_LAYOUT, &no_offsets()).unwrap();
        let right = decode(&raw, &RIGHT_LAYOUT, &no_offsets()).unwrap();

        match (left.buttons, right.buttons) {
            (Buttons::Left(l), Buttons::Right(r)) => {
                assert!(l.zl);
                assert!(r.y);
                assert!(!r.zr);
            }
            other => panic!("Unexpected button variants: {:?}", other),
        }
    }

    #[test]
    fn test_zero_report_decodes_to_zero_state() {
        let state = decode_report(&RawReport::default(), &RIGHT_LAYOUT, &no_offsets());
        assert_eq!(state.battery, Battery::default());
        assert!(!state.buttons.any_pressed());
        assert_eq!(state.stick, Stick::default());
        assert_eq!(state.imu, [ImuSample::default(); 3]);
    }
}
