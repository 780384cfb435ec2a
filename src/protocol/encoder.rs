//! # Output Report Encoder
//!
//! Builds subcommand output reports.
//!
//! ```text
//! [0]     report id (0x01)
//! [1]     packet counter (0-15)
//! [2..=9] rumble payload 00 01 40 40 00 01 40 40
//! [10]    subcommand id
//! [11..]  subcommand argument
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::report::*;

/// Four-bit sequence number stamped on every output report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCounter(u8);

impl PacketCounter {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Counter value the next report will carry
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Return the current value and advance by one, wrapping at 16
    pub fn advance(&mut self) -> u8 {
        let current = self.0;
        self.0 = (self.0 + 1) & 0x0F;
        current
    }
}

/// Subcommands this crate sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    /// Turn the 6-axis sensor on
    EnableImu,
    /// Switch to standard full input reports
    SetInputReportMode,
    /// Player lights, raw pattern byte
    SetPlayerLights(u8),
}

impl Subcommand {
    pub fn id(&self) -> u8 {
        match self {
            Subcommand::EnableImu => SUBCOMMAND_ENABLE_IMU,
            Subcommand::SetInputReportMode => SUBCOMMAND_SET_INPUT_REPORT_MODE,
            Subcommand::SetPlayerLights(_) => SUBCOMMAND_SET_PLAYER_LIGHTS,
        }
    }

    pub fn argument(&self) -> u8 {
        match self {
            Subcommand::EnableImu => IMU_ENABLED,
            Subcommand::SetInputReportMode => INPUT_REPORT_MODE_STANDARD_FULL,
            Subcommand::SetPlayerLights(pattern) => *pattern,
        }
    }
}

/// Player light pattern helpers
pub mod lights {
    /// Solid lights from the low nibble
    pub fn solid(pattern: u8) -> u8 {
        pattern & 0x0F
    }

    /// Flashing lights, nibble moved to the high half
    pub fn flashing(pattern: u8) -> u8 {
        (pattern & 0x0F) << 4
    }
}

/// Encode a complete output report and advance `counter`
///
/// # Arguments
///
/// * `counter` - Packet counter, advanced by one (mod 16)
/// * `command` - Report id, 0x01 for subcommands
/// * `subcommand` - Subcommand id
/// * `argument` - Subcommand argument bytes
///
/// # Examples
///
/// ```
/// use joycon_bridge::protocol::encoder::{encode, PacketCounter};
///
/// let mut counter = PacketCounter::new();
/// let report = encode(&mut counter, 0x01, 0x30, &[0b0101]);
/// assert_eq!(
///     &report[..],
///     &[0x01, 0x00, 0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40, 0x30, 0x05]
/// );
/// assert_eq!(counter.value(), 1);
/// ```
pub fn encode(counter: &mut PacketCounter, command: u8, subcommand: u8, argument: &[u8]) -> Bytes {
    let mut report = BytesMut::with_capacity(OUTPUT_REPORT_HEADER_SIZE + argument.len());
    report.put_u8(command);
    report.put_u8(counter.advance());
    report.put_slice(&RUMBLE_PAYLOAD);
    report.put_u8(subcommand);
    report.put_slice(argument);
    report.freeze()
}

/// Encode a known [`Subcommand`] in a 0x01 report
pub fn encode_subcommand(counter: &mut PacketCounter, subcommand: Subcommand) -> Bytes {
    encode(
        counter,
        OUTPUT_REPORT_ID_SUBCOMMAND,
        subcommand.id(),
        &[subcommand.argument()],
    )
}
