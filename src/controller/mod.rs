//! # Controller Module
//!
//! Joy-Con session handling on top of the report protocol.
//!
//! This module handles:
//! - Connecting, setting up sensors and disconnecting a controller
//! - Background polling of input reports on a dedicated thread
//! - On-demand decoding with calibration offsets
//! - Deriving calibration offsets from resting samples
//! - Discovering connected controllers

pub mod calibration;
pub mod joycon;
pub mod poller;
