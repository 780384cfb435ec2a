//! # HID Transport
//!
//! Trait seams over the raw HID device so the controller logic can run
//! against real hardware or a scripted fake.
//!
//! Methods take `&self` because one handle is shared between the polling
//! thread (reads) and the caller thread (writes).

use std::io;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

#[cfg(feature = "hidapi")]
pub mod hid;

/// Identifiers of an enumerated HID device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// An open HID device handle
pub trait Transport: Send + Sync {
    /// Read one report into `buf`, waiting at most `timeout`
    ///
    /// Returns the number of bytes read, 0 when the timeout elapsed.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Write one output report
    fn write(&self, data: &[u8]) -> io::Result<usize>;

    /// Release the device handle. Further reads and writes fail.
    fn close(&self);
}

/// Device enumeration and opening
#[cfg_attr(test, mockall::automock)]
pub trait HidBackend: Send + Sync {
    /// List currently connected HID devices
    fn enumerate(&self) -> io::Result<Vec<DeviceInfo>>;

    /// Open the first device matching `vendor_id`/`product_id`
    fn open(&self, vendor_id: u16, product_id: u16) -> io::Result<Box<dyn Transport>>;
}

/// Device handle shared by the polling thread and command writers
///
/// Every access releases the lock fairly: a waiting writer is handed the
/// device before the polling thread can take it back, so a write waits at
/// most for the read in progress.
pub struct SharedDevice<D> {
    device: Mutex<Option<D>>,
}

impl<D> SharedDevice<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Mutex::new(Some(device)),
        }
    }

    /// Run `f` with exclusive access to the device
    ///
    /// # Errors
    ///
    /// `NotConnected` once the device was closed, otherwise whatever `f` returns.
    pub fn with<T>(&self, f: impl FnOnce(&D) -> io::Result<T>) -> io::Result<T> {
        let guard = self.device.lock();
        let result = match guard.as_ref() {
            Some(device) => f(device),
            None => Err(closed()),
        };
        MutexGuard::unlock_fair(guard);
        result
    }

    /// Drop the device; later accesses fail with `NotConnected`
    pub fn close(&self) {
        self.device.lock().take();
    }

    pub fn is_open(&self) -> bool {
        self.device.lock().is_some()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "HID device closed")
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// One scripted read result
    #[derive(Debug, Clone)]
    pub enum ReadStep {
        Report(Vec<u8>),
        Timeout,
        Error(io::ErrorKind),
    }

    /// Scripted HID device for testing
    ///
    /// Reads pop from a script; once the script is empty every read times
    /// out. Clones share state, so a test can keep one clone for assertions.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        pub reads: Arc<Mutex<VecDeque<ReadStep>>>,
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub close_count: Arc<AtomicUsize>,
        pub read_count: Arc<AtomicUsize>,
        stuck: Arc<AtomicBool>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_read(&self, step: ReadStep) {
            self.reads.lock().unwrap().push_back(step);
        }

        pub fn push_report(&self, report: &[u8]) {
            self.push_read(ReadStep::Report(report.to_vec()));
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }

        pub fn read_count(&self) -> usize {
            self.read_count.load(Ordering::SeqCst)
        }

        /// Make reads block, ignoring their timeout, until [`Self::release`]
        pub fn set_stuck(&self) {
            self.stuck.store(true, Ordering::SeqCst);
        }

        pub fn release(&self) {
            self.stuck.store(false, Ordering::SeqCst);
        }
    }

    impl Transport for FakeTransport {
        fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            self.read_count.fetch_add(1, Ordering::SeqCst);
            while self.stuck.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }

            let step = self.reads.lock().unwrap().pop_front();
            match step {
                Some(ReadStep::Report(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(ReadStep::Error(kind)) => Err(io::Error::new(kind, "Mock read error")),
                Some(ReadStep::Timeout) | None => {
                    std::thread::sleep(timeout);
                    Ok(0)
                }
            }
        }

        fn write(&self, data: &[u8]) -> io::Result<usize> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }

        fn close(&self) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn test_fake_transport_scripted_reads() {
        let fake = FakeTransport::new();
        fake.push_report(&[1, 2, 3]);
        fake.push_read(ReadStep::Error(io::ErrorKind::BrokenPipe));

        let mut buf = [0u8; 8];
        assert_eq!(fake.read_timeout(&mut buf, Duration::ZERO).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        let err = fake.read_timeout(&mut buf, Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        // Script exhausted
        assert_eq!(fake.read_timeout(&mut buf, Duration::ZERO).unwrap(), 0);
        assert_eq!(fake.read_count(), 3);
    }

    #[test]
    fn test_fake_transport_records_writes() {
        let fake = FakeTransport::new();
        fake.write(&[0x01, 0x00]).unwrap();
        fake.set_write_error(io::ErrorKind::TimedOut);
        assert!(fake.write(&[0x02]).is_err());
        assert_eq!(fake.get_written_data(), vec![vec![0x01, 0x00]]);
    }

    // ==================== SharedDevice Tests ====================

    #[test]
    fn test_shared_device_close() {
        let shared = SharedDevice::new(7u8);
        assert_eq!(shared.with(|d| Ok(*d)).unwrap(), 7);
        assert!(shared.is_open());

        shared.close();
        assert!(!shared.is_open());
        let err = shared.with(|d| Ok(*d)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_shared_device_writer_not_starved_by_reader() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Instant;

        const HOLD: Duration = Duration::from_millis(20);

        let shared = Arc::new(SharedDevice::new(()));
        let stop = Arc::new(AtomicBool::new(false));

        // Polling thread: back-to-back blocking reads holding the lock
        let reader = {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let _ = shared.with(|_| {
                        std::thread::sleep(HOLD);
                        Ok(())
                    });
                }
            })
        };
        std::thread::sleep(HOLD);

        let mut worst = Duration::ZERO;
        for _ in 0..10 {
            let started = Instant::now();
            shared.with(|_| Ok(())).unwrap();
            worst = worst.max(started.elapsed());
            std::thread::sleep(Duration::from_millis(3));
        }

        stop.store(true, Ordering::Release);
        reader.join().unwrap();

        assert!(worst < HOLD * 3, "writer waited {:?}", worst);
    }

    #[test]
    fn test_mock_backend_enumerate() {
        let mut backend = MockHidBackend::new();
        backend.expect_enumerate().returning(|| {
            Ok(vec![DeviceInfo {
                vendor_id: 1406,
                product_id: 8198,
            }])
        });
        let devices = backend.enumerate().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].product_id, 8198);
    }
}
