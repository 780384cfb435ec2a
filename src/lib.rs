//! # Joycon Bridge Library
//!
//! Read buttons, analog sticks and motion sensors from Nintendo Joy-Con
//! controllers over raw HID.
//!
//! This library provides:
//! - Decoding of the 49-byte full input report into a typed controller state
//! - Encoding of subcommand output reports with the rolling packet counter
//! - A background polling loop that keeps the latest report available
//! - Calibration offsets averaged from resting samples
//! - A per-controller facade with connect/disconnect and discovery

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod controller;
