//! # Joy-Con Controller
//!
//! Lifecycle facade for one Joy-Con. Opens the transport, sends the setup
//! subcommands, runs the [`PollingLoop`] and decodes the latest report on
//! demand.
//!
//! ## States
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                     |             |
//!                     +-> Error <---+   (open/write/read failure)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # #[cfg(feature = "hidapi")]
//! # fn main() -> joycon_bridge::error::Result<()> {
//! use joycon_bridge::controller::joycon::{discover, ControllerSettings, Joycon};
//! use joycon_bridge::protocol::state::{CalibrationOffsets, Side};
//! use joycon_bridge::transport::hid::HidapiBackend;
//! use joycon_bridge::config::DeviceIds;
//!
//! let backend = HidapiBackend::new()?;
//! let found = discover(&backend, &DeviceIds::default())?;
//! let mut left = Joycon::new(found.require(Side::Left)?, ControllerSettings::default());
//! left.connect(&backend, CalibrationOffsets::default())?;
//! println!("{:?}", left.get_status()?);
//! left.disconnect();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "hidapi"))]
//! # fn main() {}
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::calibration::{self, CalibrationSchedule};
use super::poller::{PollStatus, PollingLoop};
use crate::config::DeviceIds;
use crate::error::{JoyconError, Result};
use crate::protocol::decoder::{decode_imu_sample, decode_report, decode_stick};
use crate::protocol::encoder::{encode, encode_subcommand, lights, PacketCounter, Subcommand};
use crate::protocol::layout::{Button, ButtonLayout};
use crate::protocol::report::{
    RawReport, BATTERY_CHARGING, BATTERY_LEVEL, LEFT_STICK_OFFSET, RIGHT_STICK_OFFSET,
};
use crate::protocol::state::{
    CalibrationOffsets, ControllerIdentity, ControllerState, SampleIndex, Side, Stick, Vector3,
};
use crate::transport::{HidBackend, Transport};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Not connected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
            ConnectionState::Error => "Error",
        };
        f.write_str(text)
    }
}

/// Timing knobs of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Bound on each polling read
    pub read_timeout: Duration,
    /// Pause between the two setup subcommands
    pub settle: Duration,
    /// Pause after the polling loop stopped, before closing
    pub grace: Duration,
    /// How long disconnect waits for the polling loop
    pub join_timeout: Duration,
    pub calibration: CalibrationSchedule,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(20),
            settle: Duration::from_millis(20),
            grace: Duration::from_millis(20),
            join_timeout: Duration::from_millis(500),
            calibration: CalibrationSchedule::default(),
        }
    }
}

/// One Joy-Con and its session
pub struct Joycon {
    identity: ControllerIdentity,
    layout: &'static ButtonLayout,
    settings: ControllerSettings,
    offsets: CalibrationOffsets,
    counter: PacketCounter,
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    poller: Option<PollingLoop>,
}

impl std::fmt::Display for Joycon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joycon:{{ name: {}, status: {} }}", self.name(), self.state())
    }
}

impl std::fmt::Debug for Joycon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joycon")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("offsets", &self.offsets)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl Joycon {
    pub fn new(identity: ControllerIdentity, settings: ControllerSettings) -> Self {
        Self {
            identity,
            layout: ButtonLayout::for_side(identity.side),
            settings,
            offsets: CalibrationOffsets::default(),
            counter: PacketCounter::new(),
            state: ConnectionState::Disconnected,
            transport: None,
            poller: None,
        }
    }

    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    pub fn name(&self) -> &'static str {
        self.identity.name()
    }

    pub fn is_left(&self) -> bool {
        self.identity.side == Side::Left
    }

    pub fn is_right(&self) -> bool {
        self.identity.side == Side::Right
    }

    /// Current state; a polling loop that died on a read error shows as `Error`
    pub fn state(&self) -> ConnectionState {
        if self.state == ConnectionState::Connected {
            if let Some(PollStatus::Failed(_)) = self.poller.as_ref().map(PollingLoop::status) {
                return ConnectionState::Error;
            }
        }
        self.state
    }

    /// Status text: "Connected", "Error", "Not connected", ...
    pub fn status(&self) -> String {
        self.state().to_string()
    }

    pub fn offsets(&self) -> &CalibrationOffsets {
        &self.offsets
    }

    /// Replace the offsets used by subsequent decodes
    pub fn update_calibration(&mut self, offsets: CalibrationOffsets) {
        debug!("{}: calibration updated to {:?}", self.name(), offsets);
        self.offsets = offsets;
    }

    /// Number of input reports received in this session
    pub fn reports_received(&self) -> u64 {
        self.poller.as_ref().map_or(0, PollingLoop::received)
    }

    // ==================== Lifecycle ====================

    /// Open the device, enable the IMU, switch to full reports and start polling
    ///
    /// # Arguments
    ///
    /// * `backend` - Opens the HID device
    /// * `offsets` - Calibration offsets for this session
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a session is already open
    /// - `Connection` if the device cannot be opened or a setup write fails;
    ///   the controller is left in `Error` with the handle released
    pub fn connect(&mut self, backend: &dyn HidBackend, offsets: CalibrationOffsets) -> Result<()> {
        if self.transport.is_some() {
            return Err(self.invalid_state("connect"));
        }

        self.offsets = offsets;
        self.counter = PacketCounter::new();
        self.state = ConnectionState::Connecting;

        let transport: Arc<dyn Transport> = match backend
            .open(self.identity.vendor_id, self.identity.product_id)
        {
            Ok(transport) => Arc::from(transport),
            Err(e) => {
                self.state = ConnectionState::Error;
                return Err(JoyconError::Connection(format!(
                    "Failed to open {}: {}",
                    self.name(),
                    e
                )));
            }
        };

        if let Err(e) = self.start_session(Arc::clone(&transport)) {
            transport.close();
            self.state = ConnectionState::Error;
            return Err(e);
        }

        self.transport = Some(transport);
        self.state = ConnectionState::Connected;
        info!("Connected: {}", self.name());
        Ok(())
    }

    fn start_session(&mut self, transport: Arc<dyn Transport>) -> Result<()> {
        write_subcommand(transport.as_ref(), &mut self.counter, Subcommand::EnableImu)?;
        // The controller needs a moment to apply the sensor setting
        if !self.settings.settle.is_zero() {
            std::thread::sleep(self.settings.settle);
        }
        write_subcommand(transport.as_ref(), &mut self.counter, Subcommand::SetInputReportMode)?;

        self.poller = Some(PollingLoop::spawn(
            self.name(),
            transport,
            self.settings.read_timeout,
        )?);
        Ok(())
    }

    /// Stop polling and release the device
    ///
    /// Never fails: if the polling loop does not stop within the join
    /// timeout it is detached and logged, and the handle is closed anyway.
    pub fn disconnect(&mut self) {
        let Some(transport) = self.transport.take() else {
            debug!("{}: disconnect without an open session", self.name());
            self.state = ConnectionState::Disconnected;
            return;
        };

        self.state = ConnectionState::Disconnecting;
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
            if !poller.join(self.settings.join_timeout) {
                warn!("{}: closing device with polling loop still running", self.name());
            }
        }
        if !self.settings.grace.is_zero() {
            std::thread::sleep(self.settings.grace);
        }

        transport.close();
        self.state = ConnectionState::Disconnected;
        info!("Disconnect: {}", self.name());
    }

    // ==================== Queries ====================

    fn connected_poller(&self, operation: &'static str) -> Result<&PollingLoop> {
        match (self.state(), self.poller.as_ref()) {
            (ConnectionState::Connected, Some(poller)) => Ok(poller),
            (ConnectionState::Error, Some(poller)) => match poller.status() {
                PollStatus::Failed(reason) => Err(JoyconError::Connection(format!(
                    "{} stopped reporting: {}",
                    self.name(),
                    reason
                ))),
                _ => Err(self.invalid_state(operation)),
            },
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> JoyconError {
        JoyconError::InvalidState {
            operation,
            state: self.state().to_string(),
        }
    }

    /// Latest undecoded report
    ///
    /// # Errors
    ///
    /// `InvalidState` unless connected, `Connection` after a read failure.
    pub fn raw_report(&self) -> Result<RawReport> {
        Ok(self.connected_poller("read report")?.latest())
    }

    /// Decode the latest report with the session offsets
    ///
    /// Before the first report arrives this is the all-zero state.
    pub fn get_status(&self) -> Result<ControllerState> {
        let report = self.raw_report()?;
        Ok(decode_report(&report, self.layout, &self.offsets))
    }

    pub fn battery_charging(&self) -> Result<bool> {
        Ok(self.raw_report()?.flag(BATTERY_CHARGING))
    }

    pub fn battery_level(&self) -> Result<u8> {
        Ok(self.raw_report()?.bits(BATTERY_LEVEL))
    }

    /// Raw bit of any named button, regardless of side
    pub fn button(&self, button: Button) -> Result<bool> {
        Ok(self.raw_report()?.flag(button.field()))
    }

    pub fn stick_left(&self) -> Result<Stick> {
        Ok(decode_stick(&self.raw_report()?, LEFT_STICK_OFFSET, &self.offsets))
    }

    pub fn stick_right(&self) -> Result<Stick> {
        Ok(decode_stick(&self.raw_report()?, RIGHT_STICK_OFFSET, &self.offsets))
    }

    /// Accelerometer reading of sub-sample `sample` (0..=2)
    ///
    /// # Errors
    ///
    /// `OutOfRange` for a sample index past 2.
    pub fn accel(&self, sample: usize) -> Result<Vector3> {
        let index = SampleIndex::new(sample)?;
        let report = self.raw_report()?;
        Ok(decode_imu_sample(&report, index.get(), &self.offsets).accel)
    }

    /// Gyroscope reading of sub-sample `sample` (0..=2)
    pub fn gyro(&self, sample: usize) -> Result<Vector3> {
        let index = SampleIndex::new(sample)?;
        let report = self.raw_report()?;
        Ok(decode_imu_sample(&report, index.get(), &self.offsets).gyro)
    }

    // ==================== Commands ====================

    fn connected_transport(&self, operation: &'static str) -> Result<Arc<dyn Transport>> {
        match (self.state(), self.transport.as_ref()) {
            (ConnectionState::Connected, Some(transport)) => Ok(Arc::clone(transport)),
            _ => Err(self.invalid_state(operation)),
        }
    }

    /// Send an arbitrary output report
    ///
    /// # Errors
    ///
    /// `InvalidState` unless connected. A failed write is `Connection` and
    /// puts the controller in `Error`.
    pub fn send_command(&mut self, command: u8, subcommand: u8, argument: &[u8]) -> Result<()> {
        let transport = self.connected_transport("send command")?;
        let report = encode(&mut self.counter, command, subcommand, argument);
        let result = write_report(transport.as_ref(), &report, subcommand);
        self.fail_on_error(result)
    }

    fn send(&mut self, subcommand: Subcommand) -> Result<()> {
        let transport = self.connected_transport("send command")?;
        let result = write_subcommand(transport.as_ref(), &mut self.counter, subcommand);
        self.fail_on_error(result)
    }

    fn fail_on_error(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.state = ConnectionState::Error;
        }
        result
    }

    /// Set the player lights to a raw pattern byte
    pub fn set_indicator(&mut self, pattern: u8) -> Result<()> {
        self.send(Subcommand::SetPlayerLights(pattern))
    }

    /// Solid player lights from the low nibble
    pub fn set_player_lamp_on(&mut self, pattern: u8) -> Result<()> {
        self.set_indicator(lights::solid(pattern))
    }

    /// Flashing player lights from the low nibble
    pub fn set_player_lamp_flashing(&mut self, pattern: u8) -> Result<()> {
        self.set_indicator(lights::flashing(pattern))
    }

    // ==================== Calibration ====================

    /// Sample the resting controller and install the averaged offsets
    ///
    /// Samples are decoded without offsets so re-calibrating a calibrated
    /// controller measures the true resting bias. Blocks the caller for the
    /// schedule's steps × interval.
    pub fn calibrate(&mut self) -> Result<CalibrationOffsets> {
        let transport = self.connected_transport("calibrate")?;
        self.connected_poller("calibrate")?;

        let name = self.identity.name();
        let layout = self.layout;
        let schedule = self.settings.calibration;
        let poller = self.poller.as_ref();
        let counter = &mut self.counter;
        let mut write_failed = false;

        let result = calibration::calibrate(
            &schedule,
            || match poller.map(|p| (p.status(), p.latest())) {
                Some((PollStatus::Failed(reason), _)) => Err(JoyconError::Connection(format!(
                    "{} stopped reporting: {}",
                    name, reason
                ))),
                Some((_, report)) => Ok(decode_report(&report, layout, &CalibrationOffsets::default())),
                None => Err(JoyconError::Connection(format!("{} is not polling", name))),
            },
            |pattern| {
                let written = write_subcommand(
                    transport.as_ref(),
                    counter,
                    Subcommand::SetPlayerLights(lights::solid(pattern)),
                );
                write_failed |= written.is_err();
                written
            },
        );

        // A failed write ends the session, same as for any other command
        if write_failed {
            self.state = ConnectionState::Error;
        }
        let offsets = result?;
        self.update_calibration(offsets);
        Ok(offsets)
    }
}

impl Drop for Joycon {
    fn drop(&mut self) {
        if self.transport.is_some() {
            self.disconnect();
        }
    }
}

fn write_report(transport: &dyn Transport, report: &[u8], subcommand: u8) -> Result<()> {
    transport.write(report).map_err(|e| {
        JoyconError::Connection(format!("Failed to write subcommand 0x{:02X}: {}", subcommand, e))
    })?;
    debug!(
        "Sent subcommand 0x{:02X} (packet {}, {} bytes)",
        subcommand,
        report[1],
        report.len()
    );
    Ok(())
}

fn write_subcommand(
    transport: &dyn Transport,
    counter: &mut PacketCounter,
    subcommand: Subcommand,
) -> Result<()> {
    let report = encode_subcommand(counter, subcommand);
    write_report(transport, &report, subcommand.id())
}

// ==================== Discovery ====================

/// Controllers found by [`discover`], at most one per side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub left: Option<ControllerIdentity>,
    pub right: Option<ControllerIdentity>,
}

impl Discovered {
    pub fn get(&self, side: Side) -> Option<ControllerIdentity> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// # Errors
    ///
    /// `DeviceNotFound` when no controller of `side` was found.
    pub fn require(&self, side: Side) -> Result<ControllerIdentity> {
        self.get(side).ok_or(JoyconError::DeviceNotFound { side })
    }
}

/// Find connected Joy-Cons
///
/// Devices under the Joy-Con vendor id with an unknown product id are
/// logged and skipped.
///
/// # Errors
///
/// `Connection` if the backend cannot enumerate devices.
pub fn discover(backend: &dyn HidBackend, ids: &DeviceIds) -> Result<Discovered> {
    let devices = backend
        .enumerate()
        .map_err(|e| JoyconError::Connection(format!("Failed to enumerate HID devices: {}", e)))?;

    let mut found = Discovered::default();
    for device in devices.iter().filter(|d| d.vendor_id == ids.vendor_id) {
        match ids.side_of(device.product_id) {
            Some(side) => {
                info!("Joycon {} detected", side);
                let identity = ControllerIdentity::new(side, device.vendor_id, device.product_id);
                match side {
                    Side::Left => found.left = Some(identity),
                    Side::Right => found.right = Some(identity),
                }
            }
            None => warn!(
                "Unknown product id 0x{:04x} under vendor 0x{:04x}",
                device.product_id, device.vendor_id
            ),
        }
    }
    Ok(found)
}
