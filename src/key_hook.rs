use evdev::{Device, EventSummary, InputEvent, KeyCode};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, trace, warn};

use crate::constants::{input, paths, permissions};

/// Invoked once per physical key-down
pub type KeyCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("cannot read {path}: {source}")]
    NoAccess {
        path: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no keyboard device found")]
    NoKeyboard,

    #[error("key hook is already running")]
    AlreadyRunning,
}

/// Process-wide key-down listener
pub trait InputHook: Send {
    fn start(&mut self, on_key_down: KeyCallback) -> Result<(), HookError>;
    fn stop(&mut self);
}

/// Listens on every keyboard under /dev/input, one thread per device
pub struct EvdevHook {
    running: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl EvdevHook {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }
}

impl Default for EvdevHook {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHook for EvdevHook {
    fn start(&mut self, on_key_down: KeyCallback) -> Result<(), HookError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(HookError::AlreadyRunning);
        }

        let devices = find_keyboard_devices()?;
        self.running.store(true, Ordering::SeqCst);

        for device in devices {
            let callback = Arc::clone(&on_key_down);
            let running = Arc::clone(&self.running);
            let handle = thread::spawn(move || {
                info!(device = ?device.name(), "Key listener started");
                if let Err(e) = listen_for_keys(device, &running, &callback) {
                    error!(error = %e, "Key listener error");
                }
            });
            self.handles.push(handle);
        }

        Ok(())
    }

    /// Listener threads notice the flag after their next event batch;
    /// a thread blocked on an idle keyboard is left to exit with the process.
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let count = self.handles.len();
        self.handles.clear();
        if count > 0 {
            info!(threads = count, "Key listener stopped");
        }
    }
}

fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(KeyCode::KEY_A) && keys.contains(KeyCode::KEY_SPACE))
}

/// Find all devices that look like keyboards
fn find_keyboard_devices() -> Result<Vec<Device>, HookError> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let entries = std::fs::read_dir(paths::DEV_INPUT).map_err(|source| HookError::NoAccess {
        path: paths::DEV_INPUT,
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        // Unreadable nodes are expected without input group membership
        if let Ok(device) = Device::open(&path) {
            if is_keyboard(&device) {
                info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
                devices.push(device);
            }
        }
    }

    if devices.is_empty() {
        return Err(HookError::NoKeyboard);
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");
    Ok(devices)
}

/// Number of fresh key presses in a batch; auto-repeat and releases are ignored
fn count_key_downs(events: impl IntoIterator<Item = InputEvent>) -> usize {
    events
        .into_iter()
        .filter(|event| match event.destructure() {
            EventSummary::Key(_, key, value) => {
                trace!(key = ?key, value, "Key event");
                value == input::KEY_PRESS
            }
            _ => false,
        })
        .count()
}

fn listen_for_keys(mut device: Device, running: &AtomicBool, on_key_down: &KeyCallback) -> io::Result<()> {
    while running.load(Ordering::SeqCst) {
        // Blocks until the device has events
        let presses = count_key_downs(device.fetch_events()?);

        if !running.load(Ordering::SeqCst) {
            break;
        }
        for _ in 0..presses {
            on_key_down();
        }
        if presses > 0 {
            debug!(presses, "Forwarded key presses");
        }
    }
    Ok(())
}

/// Log how to get access to input devices
pub fn print_permission_error(err: &HookError) {
    error!(error = %err, path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Key monitoring requires group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without key monitoring...");
}


#[cfg(test)]
mod tests {
    use super::manual::ManualHook;
    use super::*;
    use evdev::EventType;
    use std::sync::atomic::AtomicUsize;

    fn key(code: KeyCode, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY.0, code.code(), value)
    }

    #[test]
    fn test_count_key_downs_ignores_release_and_repeat() {
        let events = vec![
            key(KeyCode::KEY_A, input::KEY_PRESS),
            key(KeyCode::KEY_A, input::KEY_REPEAT),
            key(KeyCode::KEY_A, 0),
            key(KeyCode::KEY_B, input::KEY_PRESS),
            InputEvent::new(EventType::SYNCHRONIZATION.0, 0, 0),
        ];
        assert_eq!(count_key_downs(events), 2);
    }

    #[test]
    fn test_manual_hook_forwards_each_press_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut hook = ManualHook::default();
        let counter = Arc::clone(&count);
        hook.start(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        hook.press();
        hook.press();
        hook.stop();
        hook.press();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_evdev_hook_stop_without_start() {
        let mut hook = EvdevHook::new();
        hook.stop();
        assert!(hook.handles.is_empty());
    }
}
