//! # gcodestep Communication
//!
//! Serial transport and firmware protocol layers for gcodestep.
//! The `link` module owns the physical serial port and frames raw bytes into
//! line events; the `firmware` module encodes and decodes the per-dialect
//! wire protocols (GRBL, TinyG, g2core, Smoothieware) and maintains the
//! receive-buffer flow-control model and controller status state machine.

pub mod firmware;
pub mod link;

pub use firmware::{
    make_interface, ControllerType, DecodedFrame, DialectDescriptor, InputBuffer, MachineInterface,
};
pub use link::{
    list_ports, spawn_transport, ConnectionParams, RealSerialPort, SerialLink, SerialPortInfo,
    TransportHandle,
};
