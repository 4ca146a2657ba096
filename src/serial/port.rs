//! `serialport`-backed transport and device enumeration

use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

use super::{Connector, Transport};

/// Opens real serial devices
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortConnector;

impl Connector for SerialPortConnector {
    fn connect(&self, port: &str, baud_rate: u32, timeout: Duration) -> io::Result<Box<dyn Transport>> {
        let port = serialport::new(port, baud_rate)
            .timeout(timeout)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(Box::new(NativePort { port }))
    }
}

struct NativePort {
    port: Box<dyn SerialPort>,
}

impl Transport for NativePort {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn set_control_lines(&mut self, level: bool) -> io::Result<()> {
        self.port.write_data_terminal_ready(level)?;
        self.port.write_request_to_send(level)?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// A serial device visible to the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: Option<String>,
}

impl PortInfo {
    /// `name` plus the USB product/manufacturer when known
    pub fn display_label(&self) -> String {
        match &self.description {
            Some(description) => format!("{} ({description})", self.name),
            None => self.name.clone(),
        }
    }
}

fn describe(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let name = match (&usb.manufacturer, &usb.product) {
                (Some(m), Some(p)) => format!("{m} {p}"),
                (None, Some(p)) => p.clone(),
                (Some(m), None) => m.clone(),
                (None, None) => "USB".to_string(),
            };
            Some(format!("{name} {:04x}:{:04x}", usb.vid, usb.pid))
        }
        SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
        SerialPortType::PciPort | SerialPortType::Unknown => None,
    }
}

/// Currently visible serial devices, sorted by name
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .context("Failed to enumerate serial ports")?
        .into_iter()
        .map(|info| PortInfo {
            description: describe(&info.port_type),
            name: info.port_name,
        })
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = ports.len(), "Enumerated serial ports");
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_describe_usb_port() {
        let usb = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x1a86,
            pid: 0x7523,
            serial_number: None,
            manufacturer: Some("QinHeng".to_string()),
            product: Some("CH340".to_string()),
        });
        assert_eq!(describe(&usb).as_deref(), Some("QinHeng CH340 1a86:7523"));
    }

    #[test]
    fn test_display_label_without_description() {
        let port = PortInfo {
            name: "/dev/ttyS0".to_string(),
            description: describe(&SerialPortType::Unknown),
        };
        assert_eq!(port.display_label(), "/dev/ttyS0");
    }
}
