//! Normalized decode result shared by all dialects
//!
//! A decoded frame is a sparse, additive structure: dialects fill in only
//! the parts their wire format carries, and an unparsable line yields an
//! empty frame rather than an error.

use gcodestep_core::{MachineState, Position};

/// Acknowledgment footer, normalized across dialects.
///
/// Text dialects synthesize this from `ok`/`error:N` lines; JSON dialects
/// carry it as the `f` footer triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFooter {
    /// Whether the firmware accepted the command
    pub success: bool,
    /// Firmware error code (0 on success)
    pub code: i64,
    /// Bytes freed from the receive-buffer model by this acknowledgment
    pub freed: usize,
}

/// Fields extracted from a status report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusFields {
    /// Reported machine state, if present
    pub state: Option<MachineState>,
    /// Machine-coordinate position, if present
    pub machine_pos: Option<Position>,
    /// Work-coordinate position, if present
    pub work_pos: Option<Position>,
    /// Current velocity, if present
    pub velocity: Option<f64>,
    /// Current feed rate, if present
    pub feed_rate: Option<f64>,
}

/// The normalized result of decoding one inbound line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedFrame {
    /// Status report contents
    pub status: Option<StatusFields>,
    /// Acknowledgment or error footer
    pub ack: Option<AckFooter>,
    /// Human-readable diagnostic text (error description, banner, echo)
    pub info: Option<String>,
}

impl DecodedFrame {
    /// A frame with nothing recognized in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when decode recognized nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.ack.is_none() && self.info.is_none()
    }
}
