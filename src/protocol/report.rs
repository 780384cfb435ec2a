//! # Report Constants and Types
//!
//! Core wire definitions for the Joy-Con HID report protocol.

use crate::error::{JoyconError, Result};

/// Input report size in bytes (standard full report, mode 0x30)
pub const INPUT_REPORT_SIZE: usize = 49;

/// Output report id used for rumble + subcommand reports
pub const OUTPUT_REPORT_ID_SUBCOMMAND: u8 = 0x01;

/// Placeholder rumble payload sent with every subcommand
pub const RUMBLE_PAYLOAD: [u8; 8] = [0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40];

/// Output report header size: report id + counter + rumble payload + subcommand
pub const OUTPUT_REPORT_HEADER_SIZE: usize = 2 + RUMBLE_PAYLOAD.len() + 1;

/// Subcommand: set input report mode
pub const SUBCOMMAND_SET_INPUT_REPORT_MODE: u8 = 0x03;

/// Subcommand: set player lights
pub const SUBCOMMAND_SET_PLAYER_LIGHTS: u8 = 0x30;

/// Subcommand: enable 6-axis sensor
pub const SUBCOMMAND_ENABLE_IMU: u8 = 0x40;

/// Argument for [`SUBCOMMAND_ENABLE_IMU`]: sensor on
pub const IMU_ENABLED: u8 = 0x01;

/// Argument for [`SUBCOMMAND_SET_INPUT_REPORT_MODE`]: standard full report
pub const INPUT_REPORT_MODE_STANDARD_FULL: u8 = 0x30;

/// Byte holding the battery nibble
pub const BATTERY_BYTE: usize = 2;

/// Left stick triplet offset
pub const LEFT_STICK_OFFSET: usize = 6;

/// Right stick triplet offset
pub const RIGHT_STICK_OFFSET: usize = 9;

/// First IMU sample offset
pub const IMU_OFFSET: usize = 13;

/// Bytes per IMU sample (6 × i16)
pub const IMU_SAMPLE_STRIDE: usize = 12;

/// IMU samples carried by one report
pub const IMU_SAMPLES_PER_REPORT: usize = 3;

/// Position of a bit field inside an input report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub byte: usize,
    pub bit: u8,
    pub width: u8,
}

impl BitField {
    /// Single-bit flag at `byte`/`bit`
    pub const fn flag(byte: usize, bit: u8) -> Self {
        Self { byte, bit, width: 1 }
    }

    pub const fn new(byte: usize, bit: u8, width: u8) -> Self {
        Self { byte, bit, width }
    }
}

/// Charging flag (byte 2, bit 4)
pub const BATTERY_CHARGING: BitField = BitField::flag(BATTERY_BYTE, 4);

/// Battery level (byte 2, bits 5-7)
pub const BATTERY_LEVEL: BitField = BitField::new(BATTERY_BYTE, 5, 3);

/// Charging grip attached (byte 4, bit 7)
pub const CHARGING_GRIP: BitField = BitField::flag(4, 7);

/// A complete 49-byte input report
///
/// The all-zero report is what a controller exposes before its first read
/// completes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawReport([u8; INPUT_REPORT_SIZE]);

impl Default for RawReport {
    fn default() -> Self {
        Self([0u8; INPUT_REPORT_SIZE])
    }
}

impl std::fmt::Debug for RawReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawReport({:02X?})", &self.0[..])
    }
}

impl RawReport {
    pub const fn new(bytes: [u8; INPUT_REPORT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a report from a byte slice
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the slice is not exactly 49 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; INPUT_REPORT_SIZE] = bytes.try_into().map_err(|_| {
            JoyconError::Protocol(format!(
                "input report must be {} bytes, got {}",
                INPUT_REPORT_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; INPUT_REPORT_SIZE] {
        &self.0
    }

    /// Extract `field` as `(byte >> bit) & mask`
    #[inline]
    pub fn bits(&self, field: BitField) -> u8 {
        let mask = ((1u16 << field.width) - 1) as u8;
        (self.0[field.byte] >> field.bit) & mask
    }

    #[inline]
    pub fn flag(&self, field: BitField) -> bool {
        self.bits(field) != 0
    }

    /// Little-endian signed 16-bit value at `offset`
    #[inline]
    pub fn i16_le(&self, offset: usize) -> i16 {
        to_int16(self.0[offset], self.0[offset + 1])
    }

    /// Packed 12-bit stick pair starting at `offset`
    ///
    /// ```text
    /// horizontal = b0 | (b1 & 0x0F) << 8
    /// vertical   = b1 >> 4 | b2 << 4
    /// ```
    #[inline]
    pub fn stick_raw(&self, offset: usize) -> (u16, u16) {
        let b0 = self.0[offset] as u16;
        let b1 = self.0[offset + 1] as u16;
        let b2 = self.0[offset + 2] as u16;
        (b0 | ((b1 & 0x0F) << 8), (b1 >> 4) | (b2 << 4))
    }
}

impl TryFrom<&[u8]> for RawReport {
    type Error = JoyconError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

/// Reconstruct a two's-complement i16 from its low and high bytes
///
/// Values at or above 32768 wrap to negative, so 0xFFFF becomes -1.
#[inline]
pub fn to_int16(low: u8, high: u8) -> i16 {
    let raw = (low as u16) | ((high as u16) << 8);
    if raw >= 0x8000 {
        (raw as i32 - 0x1_0000) as i16
    } else {
        raw as i16
    }
}
