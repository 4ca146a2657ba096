//! In-memory serial device for unit tests
//!
//! Records every byte written, counts live handles, and can be told to fail
//! opens or writes.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Connector, Transport};

#[derive(Default)]
struct Shared {
    wire: Mutex<Vec<u8>>,
    opened: Mutex<Vec<String>>,
    control_levels: Mutex<Vec<bool>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    flushes: AtomicUsize,
    clears: AtomicUsize,
    fail_open: AtomicBool,
    fail_write: AtomicBool,
}

/// Connector whose transports write into a shared buffer
#[derive(Clone, Default)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_opens(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Everything written so far, across all handles
    pub fn wire(&self) -> Vec<u8> {
        self.shared.wire.lock().unwrap().clone()
    }

    pub fn wire_lines(&self) -> Vec<String> {
        String::from_utf8(self.wire())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn opened_ports(&self) -> Vec<String> {
        self.shared.opened.lock().unwrap().clone()
    }

    pub fn control_line_levels(&self) -> Vec<bool> {
        self.shared.control_levels.lock().unwrap().clone()
    }

    pub fn live_handles(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn max_live_handles(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.shared.clears.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, port: &str, _baud_rate: u32, _timeout: Duration) -> io::Result<Box<dyn Transport>> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("{port} not present")));
        }

        self.shared.opened.lock().unwrap().push(port.to_string());
        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockTransport {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockTransport {
    shared: Arc<Shared>,
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.shared.fail_write.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        // One byte at a time so unsynchronized callers would visibly interleave
        for byte in bytes {
            self.shared.wire.lock().unwrap().push(*byte);
            thread::yield_now();
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.shared.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_control_lines(&mut self, level: bool) -> io::Result<()> {
        self.shared.control_levels.lock().unwrap().push(level);
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.shared.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
