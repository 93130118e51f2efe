//! Error handling for gcodestep
//!
//! Provides error types for the transport and protocol layers:
//! - Connection errors (serial port open/IO failures)
//! - Controller errors (state machine violations, rejected commands)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures of the physical serial link. These are fatal to the
/// current session and surface to the consumer as an `Abort` event.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Serial port could not be opened
    #[error("Failed to open port {port}: {reason}")]
    OpenFailed {
        /// The port name that failed to open.
        port: String,
        /// The underlying failure description.
        reason: String,
    },

    /// I/O failure on an open port
    #[error("Serial I/O error: {0}")]
    Io(String),

    /// Port is not open
    #[error("Port not open")]
    NotOpen,

    /// Port enumeration failed
    #[error("Failed to enumerate ports: {0}")]
    Enumeration(String),
}

/// Controller error type
///
/// Represents errors in driving the controller: invalid engine transitions,
/// rejected commands, and firmware-reported alarm conditions.
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// Invalid execution engine transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },

    /// Command was rejected
    #[error("Command rejected: {reason}")]
    CommandRejected {
        /// The reason the command was rejected.
        reason: String,
    },

    /// Alarm condition reported by the firmware
    #[error("Alarm: {code} - {message}")]
    Alarm {
        /// The alarm code.
        code: u32,
        /// The alarm message.
        message: String,
    },

    /// Unknown firmware dialect name
    #[error("Unknown controller dialect: {0}")]
    UnknownDialect(String),
}

/// Umbrella error type for the workspace.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Connection layer failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Controller layer failure
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(ConnectionError::OpenFailed {
            port: "/dev/ttyUSB0".to_string(),
            reason: "busy".to_string(),
        });
        assert_eq!(err.to_string(), "Failed to open port /dev/ttyUSB0: busy");

        let err = Error::from(ControllerError::CommandRejected {
            reason: "buffer full".to_string(),
        });
        assert!(err.to_string().contains("buffer full"));
    }
}
