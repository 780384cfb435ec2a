//! hidapi-backed transport (feature `hidapi`)

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use hidapi::{HidApi, HidDevice, HidError};
use tracing::debug;

use super::{DeviceInfo, HidBackend, SharedDevice, Transport};

fn to_io(err: HidError) -> io::Error {
    io::Error::other(err.to_string())
}

/// Enumerates and opens devices through the system hidapi library
pub struct HidapiBackend {
    api: Mutex<HidApi>,
}

impl HidapiBackend {
    pub fn new() -> io::Result<Self> {
        let api = HidApi::new().map_err(to_io)?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl HidBackend for HidapiBackend {
    fn enumerate(&self) -> io::Result<Vec<DeviceInfo>> {
        let mut api = self
            .api
            .lock()
            .map_err(|_| io::Error::other("hidapi lock poisoned"))?;
        api.refresh_devices().map_err(to_io)?;

        Ok(api
            .device_list()
            .map(|info| DeviceInfo {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            })
            .collect())
    }

    fn open(&self, vendor_id: u16, product_id: u16) -> io::Result<Box<dyn Transport>> {
        let api = self
            .api
            .lock()
            .map_err(|_| io::Error::other("hidapi lock poisoned"))?;
        let device = api.open(vendor_id, product_id).map_err(to_io)?;
        debug!("Opened HID device {:04x}:{:04x}", vendor_id, product_id);

        Ok(Box::new(HidapiTransport {
            device: SharedDevice::new(device),
        }))
    }
}

/// One open hidapi device
///
/// `HidDevice` is not `Sync`, so reads and writes take turns on a
/// [`SharedDevice`]. A writer waits at most for the read in progress.
pub struct HidapiTransport {
    device: SharedDevice<HidDevice>,
}

impl Transport for HidapiTransport {
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self.device
            .with(|device| device.read_timeout(buf, millis).map_err(to_io))
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.device.with(|device| device.write(data).map_err(to_io))
    }

    fn close(&self) {
        self.device.close();
    }
}
