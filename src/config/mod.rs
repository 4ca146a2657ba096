//! Configuration management for bongo-bridge
//!
//! A single flat JSON record holds everything the bridge needs:
//! which serial port the device sits on and the Wi-Fi credentials
//! pushed to it after every (re)connect.

pub mod settings;

// Re-export commonly used types
pub use settings::{Settings, SettingsStore};
