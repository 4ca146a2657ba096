//! Serial session management
//!
//! Owns the single connection to the ESP8266. Every write goes through one
//! mutex so the tray actions and the key hook thread never interleave bytes
//! on the wire. Opening and closing are serialized by a second lock so there
//! is never more than one live handle, and neither lock is held while the
//! device boots.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::serial as consts;

#[cfg(test)]
pub mod mock;
pub mod port;

pub use port::{list_ports, PortInfo, SerialPortConnector};

/// Errors reported by [`SerialSession`]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no serial port configured")]
    NotConfigured,

    #[error("serial port is not open")]
    NotOpen,

    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("serial write failed: {0}")]
    Write(#[source] io::Error),
}

/// Byte sink for an opened serial device
pub trait Transport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until queued output has been transmitted
    fn flush(&mut self) -> io::Result<()>;

    /// Drive DTR and RTS to `level`
    fn set_control_lines(&mut self, level: bool) -> io::Result<()>;

    /// Discard anything buffered in either direction
    fn clear_buffers(&mut self) -> io::Result<()>;
}

/// Opens [`Transport`]s by port name
pub trait Connector: Send + Sync {
    fn connect(&self, port: &str, baud_rate: u32, timeout: Duration) -> io::Result<Box<dyn Transport>>;
}

/// Fixed delays used around the device's reset and boot window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub port_release: Duration,
    pub boot_stabilize: Duration,
    pub reconnect_settle: Duration,
    pub device_ready: Duration,
    pub wifi_repeat_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            port_release: consts::PORT_RELEASE_DELAY,
            boot_stabilize: consts::BOOT_STABILIZE_DELAY,
            reconnect_settle: consts::RECONNECT_SETTLE_DELAY,
            device_ready: consts::DEVICE_READY_DELAY,
            wifi_repeat_interval: consts::WIFI_REPEAT_INTERVAL,
        }
    }
}

impl Timings {
    /// All delays zero, for tests
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            port_release: Duration::ZERO,
            boot_stabilize: Duration::ZERO,
            reconnect_settle: Duration::ZERO,
            device_ready: Duration::ZERO,
            wifi_repeat_interval: Duration::ZERO,
        }
    }
}

/// Sleep unless `delay` is zero
pub fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

struct OpenPort {
    name: String,
    transport: Box<dyn Transport>,
}

/// The one serial connection shared by every producer
pub struct SerialSession {
    connector: Box<dyn Connector>,
    timings: Timings,
    /// Serializes open/close so two opens never both create handles
    lifecycle: Mutex<()>,
    /// Guards every access to the handle itself
    handle: Mutex<Option<OpenPort>>,
}

impl SerialSession {
    pub fn new(connector: Box<dyn Connector>, timings: Timings) -> Self {
        Self {
            connector,
            timings,
            lifecycle: Mutex::new(()),
            handle: Mutex::new(None),
        }
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<OpenPort>> {
        // A panic mid-write leaves nothing half-updated in the Option itself
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.lock_handle().is_some()
    }

    /// Name of the currently open port
    pub fn port_name(&self) -> Option<String> {
        self.lock_handle().as_ref().map(|open| open.name.clone())
    }

    /// Open `port`, replacing any existing handle
    ///
    /// DTR and RTS are deasserted, the device is given time to boot, and
    /// whatever it printed during the reset window is discarded before the
    /// handle becomes visible to writers.
    pub fn open(&self, port: &str) -> Result<(), SessionError> {
        let port = port.trim();
        if port.is_empty() {
            warn!("No serial port configured");
            return Err(SessionError::NotConfigured);
        }

        let _lifecycle = self.lock_lifecycle();

        let previous = self.lock_handle().take();
        if let Some(previous) = previous {
            info!(port = %previous.name, "Closing existing serial port before reopening");
            drop(previous);
            pause(self.timings.port_release);
        }

        info!(port = %port, baud = consts::BAUD_RATE, "Opening serial port");
        let open_error = |source: io::Error| {
            warn!(port = %port, error = %source, "Failed to open serial port");
            SessionError::Open {
                port: port.to_string(),
                source,
            }
        };

        let mut transport = self
            .connector
            .connect(port, consts::BAUD_RATE, consts::PORT_TIMEOUT)
            .map_err(open_error)?;

        transport.set_control_lines(false).map_err(open_error)?;
        debug!(delay = ?self.timings.boot_stabilize, "Waiting for device to boot");
        pause(self.timings.boot_stabilize);
        transport.clear_buffers().map_err(open_error)?;

        *self.lock_handle() = Some(OpenPort {
            name: port.to_string(),
            transport,
        });

        info!(port = %port, "Serial port open");
        Ok(())
    }

    /// Close the handle if one is open
    pub fn close(&self) {
        let _lifecycle = self.lock_lifecycle();
        if let Some(open) = self.lock_handle().take() {
            info!(port = %open.name, "Serial port closed");
        }
    }

    /// Write `bytes` while holding the session lock
    ///
    /// Performs no I/O when nothing is open.
    pub fn guarded_write(&self, bytes: &[u8]) -> Result<(), SessionError> {
        let mut handle = self.lock_handle();
        let open = handle.as_mut().ok_or(SessionError::NotOpen)?;
        open.transport.write_all(bytes).map_err(SessionError::Write)
    }

    /// Wait for queued output to drain
    pub fn flush(&self) -> Result<(), SessionError> {
        let mut handle = self.lock_handle();
        let open = handle.as_mut().ok_or(SessionError::NotOpen)?;
        open.transport.flush().map_err(SessionError::Write)
    }
}
