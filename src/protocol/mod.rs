//! # Joy-Con Report Protocol
//!
//! Wire-level handling of the Joy-Con HID reports.
//!
//! This module handles:
//! - Input report layout and bit/byte extraction (49-byte standard full report)
//! - Decoding battery, buttons, sticks and IMU samples into typed state
//! - Side-specific button layouts
//! - Encoding subcommand output reports with the 4-bit packet counter

pub mod report;
pub mod state;
pub mod layout;
pub mod decoder;
pub mod encoder;
