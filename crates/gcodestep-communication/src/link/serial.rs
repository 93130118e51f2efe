//! Serial port implementation backed by the `serialport` crate
//!
//! Supports:
//! - Port enumeration filtered to CNC controller device patterns
//! - 8N1, no-flow-control configuration with a short read timeout
//! - Blocking write / timeout-bounded read

use super::{ConnectionParams, SerialLink};
use gcodestep_core::{ConnectionError, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Port description (e.g., "USB Serial Port")
    pub description: String,
    /// Manufacturer name if available
    pub manufacturer: Option<String>,
    /// Serial number if available
    pub serial_number: Option<String>,
}

/// List available serial ports on the system
///
/// Filters ports to include only CNC controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::Enumeration(e.to_string())
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_cnc_port(&port.port_name))
        .map(|port| {
            let (description, manufacturer, serial_number) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => (
                    format!(
                        "USB {} {}",
                        usb.manufacturer.as_deref().unwrap_or("Device"),
                        usb.product.as_deref().unwrap_or("Serial Port")
                    ),
                    usb.manufacturer.clone(),
                    usb.serial_number.clone(),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth Serial".to_string(), None, None)
                }
                _ => ("Serial Port".to_string(), None, None),
            };
            SerialPortInfo {
                port_name: port.port_name.clone(),
                description,
                manufacturer,
                serial_number,
            }
        })
        .collect())
}

/// Check if a port name matches CNC controller patterns
fn is_cnc_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Real serial port implementation using the serialport crate
pub struct RealSerialPort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl RealSerialPort {
    /// Open a serial port with the given parameters.
    ///
    /// Configures 8N1 with no flow control and a short read timeout so the
    /// transport loop never blocks longer than one tick.
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.timeout_ms))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => Ok(Self {
                port,
                name: params.port.clone(),
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Err(ConnectionError::OpenFailed {
                    port: params.port.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
}

impl SerialLink for RealSerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the port handle releases the device.
        Ok(())
    }
}
