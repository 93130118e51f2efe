//! Serial link abstraction and port discovery
//!
//! Provides the low-level byte-oriented interface to the physical serial
//! port. The transport task in [`transport`] is the only component that
//! touches a [`SerialLink`] after it has been opened.

pub mod serial;
pub mod transport;

pub use serial::{list_ports, RealSerialPort, SerialPortInfo};
pub use transport::{spawn_transport, TransportHandle};

use std::io;

/// Connection parameters for a serial session.
///
/// The framing is fixed at 8 data bits, no parity, one stop bit, and no flow
/// control, which is what every supported controller firmware expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate (115200 for GRBL and TinyG-family controllers)
    pub baud_rate: u32,
    /// Read timeout in milliseconds; short so the transport loop stays live
    pub timeout_ms: u64,
}

impl ConnectionParams {
    /// Parameters for `port` with the default baud rate and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            timeout_ms: 10,
        }
    }
}

/// Low-level serial port interface
///
/// Implemented by [`RealSerialPort`] for hardware and by in-memory mocks in
/// tests. Reads use the port's short timeout and return `Ok(0)` or a
/// `TimedOut`/`WouldBlock` error when no data is available.
pub trait SerialLink: Send {
    /// Read available bytes into `buf`
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write exactly the bytes given
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Get the port name for diagnostics
    fn name(&self) -> String;

    /// Close the port
    fn close(&mut self) -> io::Result<()>;
}
