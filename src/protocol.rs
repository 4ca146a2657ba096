//! Line protocol spoken to the bongo cat firmware
//!
//! All messages are newline-terminated ASCII. There is no response channel,
//! so "sent" only ever means the write did not fail.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::constants::{protocol, serial as serial_consts};
use crate::serial::{pause, SerialSession, SessionError};

/// Outbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand<'a> {
    /// Momentary key pulse
    Key,
    /// Connectivity probe
    Test,
    /// Credential provisioning line
    Wifi { ssid: &'a str, password: &'a str },
}

impl DeviceCommand<'_> {
    /// Wire bytes including the trailing newline
    pub fn encode(&self) -> Vec<u8> {
        let mut line = match self {
            DeviceCommand::Key => protocol::KEY.to_string(),
            DeviceCommand::Test => protocol::TEST.to_string(),
            DeviceCommand::Wifi { ssid, password } => format!(
                "{}{ssid}{}{password}",
                protocol::WIFI_PREFIX,
                protocol::WIFI_SEPARATOR
            ),
        }
        .into_bytes();
        line.push(protocol::LINE_END);
        line
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Wi-Fi SSID is not configured")]
    MissingNetworkName,

    #[error("Wi-Fi {0} contains a line break")]
    LineBreak(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\n', '\r'])
}

/// Formats commands and writes them through the shared session
#[derive(Clone)]
pub struct DeviceSender {
    session: Arc<SerialSession>,
}

impl DeviceSender {
    pub fn new(session: Arc<SerialSession>) -> Self {
        Self { session }
    }

    fn send_line(&self, command: DeviceCommand<'_>) -> Result<(), SessionError> {
        self.session.guarded_write(&command.encode())?;
        self.session.flush()
    }

    /// One key pulse; callers treat failures as silent
    pub fn send_key(&self) -> Result<(), SessionError> {
        self.send_line(DeviceCommand::Key)
    }

    /// Connectivity probe
    pub fn send_test(&self) -> Result<(), SessionError> {
        self.send_line(DeviceCommand::Test)?;
        info!("Test command sent");
        Ok(())
    }

    /// Send the credential line [`WIFI_REPEAT_COUNT`](serial_consts::WIFI_REPEAT_COUNT) times
    ///
    /// Each line is a separate locked write, so a key pulse may land between
    /// repetitions but never inside one.
    pub fn send_wifi(&self, settings: &Settings) -> Result<(), SendError> {
        if settings.network_name.is_empty() {
            warn!("Wi-Fi SSID is not configured");
            return Err(SendError::MissingNetworkName);
        }
        if has_line_break(&settings.network_name) {
            return Err(SendError::LineBreak("SSID"));
        }
        if has_line_break(&settings.network_secret) {
            return Err(SendError::LineBreak("password"));
        }

        let line = DeviceCommand::Wifi {
            ssid: &settings.network_name,
            password: &settings.network_secret,
        }
        .encode();

        info!(ssid = %settings.network_name, "Sending Wi-Fi credentials");
        let interval = self.session.timings().wifi_repeat_interval;
        for attempt in 1..=serial_consts::WIFI_REPEAT_COUNT {
            self.session.guarded_write(&line).inspect_err(|e| {
                warn!(attempt, error = %e, "Wi-Fi credential write failed");
            })?;
            debug!(attempt, "Wi-Fi credential line written");
            pause(interval);
        }
        self.session.flush()?;

        info!(ssid = %settings.network_name, "Wi-Fi credentials sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::MockConnector;
    use crate::serial::Timings;

    fn open_sender() -> (MockConnector, DeviceSender) {
        let connector = MockConnector::new();
        let session = Arc::new(SerialSession::new(Box::new(connector.clone()), Timings::immediate()));
        session.open("COM3").unwrap();
        (connector, DeviceSender::new(session))
    }

    #[test]
    fn test_encode_commands() {
        assert_eq!(DeviceCommand::Key.encode(), b"KEY\n");
        assert_eq!(DeviceCommand::Test.encode(), b"TEST\n");
        assert_eq!(
            DeviceCommand::Wifi { ssid: "HomeNet", password: "s3cr3t" }.encode(),
            b"WIFI:HomeNet,s3cr3t\n"
        );
    }

    #[test]
    fn test_wifi_line_sent_three_times() {
        let (connector, sender) = open_sender();
        let settings = Settings::new("COM3", "HomeNet", "s3cr3t");

        sender.send_wifi(&settings).unwrap();

        assert_eq!(connector.wire_lines(), vec!["WIFI:HomeNet,s3cr3t"; 3]);
        assert_eq!(connector.flush_count(), 1);
    }

    #[test]
    fn test_wifi_with_empty_password() {
        let (connector, sender) = open_sender();

        sender.send_wifi(&Settings::new("COM3", "OpenCafe", "")).unwrap();

        assert_eq!(connector.wire_lines(), vec!["WIFI:OpenCafe,"; 3]);
    }

    #[test]
    fn test_wifi_requires_ssid() {
        let (connector, sender) = open_sender();

        let err = sender.send_wifi(&Settings::new("COM3", "", "pw")).unwrap_err();

        assert!(matches!(err, SendError::MissingNetworkName));
        assert!(connector.wire().is_empty());
    }

    #[test]
    fn test_wifi_rejects_line_breaks() {
        let (connector, sender) = open_sender();

        let err = sender.send_wifi(&Settings::new("COM3", "Home", "pw\nKEY")).unwrap_err();

        assert!(matches!(err, SendError::LineBreak("password")));
        assert!(connector.wire().is_empty());
    }

    #[test]
    fn test_sends_fail_closed_without_session() {
        let connector = MockConnector::new();
        let session = Arc::new(SerialSession::new(Box::new(connector.clone()), Timings::immediate()));
        let sender = DeviceSender::new(session);

        assert!(matches!(sender.send_key(), Err(SessionError::NotOpen)));
        assert!(matches!(sender.send_test(), Err(SessionError::NotOpen)));
        assert!(matches!(
            sender.send_wifi(&Settings::new("COM3", "HomeNet", "s3cr3t")),
            Err(SendError::Session(SessionError::NotOpen))
        ));
        assert!(connector.opened_ports().is_empty());
        assert!(connector.wire().is_empty());
    }

    #[test]
    fn test_key_and_test_are_single_flushed_lines() {
        let (connector, sender) = open_sender();

        sender.send_key().unwrap();
        sender.send_test().unwrap();

        assert_eq!(connector.wire_lines(), vec!["KEY", "TEST"]);
        assert_eq!(connector.flush_count(), 2);
    }
}
