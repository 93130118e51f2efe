//! # gcodestep Core
//!
//! Core types shared by the gcodestep transport, protocol, and execution
//! layers: the machine data model, the event/command vocabulary exchanged
//! between components, and the error types.

pub mod data;
pub mod error;
pub mod event;

pub use data::{AxisCoords, ControllerStatus, MachineState, Position, PositioningMode};
pub use error::{ConnectionError, ControllerError, Error, Result};
pub use event::{LinkCommand, LinkEvent, RunnerCommand, SenderEvent};
