//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Serial link parameters and device timing
pub mod serial {
    use std::time::Duration;

    /// Baud rate the firmware listens on
    pub const BAUD_RATE: u32 = 115_200;

    /// Read/write timeout applied to the port
    pub const PORT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Wait after closing an open handle so the OS releases the device node
    pub const PORT_RELEASE_DELAY: Duration = Duration::from_millis(500);

    /// ESP8266 boot time after DTR/RTS are deasserted
    pub const BOOT_STABILIZE_DELAY: Duration = Duration::from_secs(2);

    /// Pause between closing and reopening during a reconnect
    pub const RECONNECT_SETTLE_DELAY: Duration = Duration::from_secs(1);

    /// Pause between a successful open and the first credential send
    pub const DEVICE_READY_DELAY: Duration = Duration::from_secs(1);

    /// Number of times the credential line is written per send
    pub const WIFI_REPEAT_COUNT: usize = 3;

    /// Pause after each credential line
    pub const WIFI_REPEAT_INTERVAL: Duration = Duration::from_millis(100);
}

/// Line protocol tokens understood by the firmware
pub mod protocol {
    /// Momentary input pulse
    pub const KEY: &str = "KEY";

    /// Connectivity probe
    pub const TEST: &str = "TEST";

    /// Prefix of the credential line (`WIFI:<ssid>,<password>`)
    pub const WIFI_PREFIX: &str = "WIFI:";

    /// Separator between SSID and password
    pub const WIFI_SEPARATOR: char = ',';

    /// Line terminator
    pub const LINE_END: u8 = b'\n';
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key repeat event value
    pub const KEY_REPEAT: i32 = 2;
}

/// Paths used for device discovery
pub mod paths {
    /// Linux input device directory
    pub const DEV_INPUT: &str = "/dev/input";
}

/// Permission hints shown when the input hook cannot start
pub mod permissions {
    /// Group that owns /dev/input/event*
    pub const INPUT_GROUP: &str = "input";

    /// Command to add the current user to the input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";

    /// Group that owns /dev/ttyUSB* and /dev/ttyACM* on most distributions
    pub const SERIAL_GROUP: &str = "dialout";
}

/// Config file location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "bongo-bridge";

    /// Settings file name
    pub const FILENAME: &str = "config.json";
}

/// Tray presentation
pub mod tray {
    /// StatusNotifierItem id
    pub const ID: &str = "bongo-bridge";

    /// Title shown by the tray host
    pub const TITLE: &str = "BongoCat Controller";

    /// Side length of the generated fallback icon
    pub const FALLBACK_ICON_SIZE: i32 = 64;

    /// Fallback icon color (ARGB)
    pub const FALLBACK_ICON_ARGB: [u8; 4] = [0xFF, 0x00, 0x00, 0xFF];
}

/// Child-process exit codes
pub mod exit_code {
    /// Setup dialog completed and settings were saved
    pub const SETUP_SAVED: i32 = 0;

    /// Setup dialog was cancelled or failed validation
    pub const SETUP_CANCELLED: i32 = 2;
}
