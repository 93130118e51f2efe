//! Firmware dialect implementations for the supported CNC controllers
//!
//! Supported controllers:
//! - GRBL: text protocol, 127-byte receive buffer
//! - TinyG: JSON protocol
//! - g2core: next generation of TinyG, JSON protocol
//! - Smoothieware: text protocol
//!
//! Each dialect owns its own [`InputBuffer`] flow-control model and
//! controller status; instances are created through [`make_interface`]
//! rather than shared registries, so independent sessions never interfere.

pub mod buffer;
pub mod frame;
pub mod g2core;
pub mod grbl;
mod json;
pub mod smoothie;
pub mod tinyg;

pub use buffer::InputBuffer;
pub use frame::{AckFooter, DecodedFrame, StatusFields};

use gcodestep_core::{AxisCoords, ControllerStatus};

/// Supported CNC controller dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerType {
    /// GRBL (default, most common)
    #[default]
    Grbl,
    /// TinyG
    TinyG,
    /// g2core (TinyG successor)
    G2Core,
    /// Smoothieware
    Smoothieware,
}

impl ControllerType {
    /// Parse a dialect name as used in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "grbl" => Some(Self::Grbl),
            "tinyg" => Some(Self::TinyG),
            "g2core" => Some(Self::G2Core),
            "smoothieware" | "smoothie" => Some(Self::Smoothieware),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControllerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grbl => write!(f, "GRBL"),
            Self::TinyG => write!(f, "TinyG"),
            Self::G2Core => write!(f, "g2core"),
            Self::Smoothieware => write!(f, "Smoothieware"),
        }
    }
}

/// Static identity and command vocabulary of a firmware dialect.
///
/// Immutable per dialect; selected once per session.
#[derive(Debug, Clone, Copy)]
pub struct DialectDescriptor {
    /// Numeric dialect id
    pub id: u8,
    /// Dialect name
    pub name: &'static str,
    /// Receive buffer capacity in bytes
    pub buffer_capacity: usize,
    /// High-watermark fraction used as the admission ceiling
    pub watermark_fraction: f64,
    /// Realtime status-query character
    pub status_query: char,
    /// Realtime feed-hold command
    pub feed_hold: &'static str,
    /// Realtime cycle-resume command
    pub cycle_resume: &'static str,
    /// Queue-flush command (clears buffer accounting)
    pub queue_flush: &'static str,
    /// Soft-reset command
    pub reset: &'static str,
    /// Set-axis (work origin) command prefix
    pub set_axis: &'static str,
    /// Homing command
    pub home: &'static str,
    /// Whether the homing command takes axis words
    pub home_takes_axes: bool,
    /// Probe command prefix
    pub probe: &'static str,
    /// Alarm-clear command
    pub clear_alarm: &'static str,
    /// System/build information query
    pub system_info: &'static str,
}

impl DialectDescriptor {
    /// True when `line` is one of the single-byte realtime commands that the
    /// firmware consumes out-of-band, bypassing buffer accounting.
    pub fn is_realtime(&self, line: &str) -> bool {
        line.len() == 1
            && (line == self.feed_hold
                || line == self.cycle_resume
                || line == self.reset
                || line == self.queue_flush)
    }

    /// Compute the wire form and buffer charge for a line.
    ///
    /// All occurrences of the status-query character are coalesced into a
    /// single trailing one; the query contributes exactly 1 byte to the
    /// charge regardless of how many times it appeared. Returns the payload
    /// (without line terminator), the pending-queue charge, and whether a
    /// query byte must be accounted out-of-band.
    pub fn coalesce_query(&self, line: &str) -> (String, usize, bool) {
        if !line.contains(self.status_query) {
            return (line.to_string(), line.len(), false);
        }
        let mut stripped: String = line.chars().filter(|&c| c != self.status_query).collect();
        let charge = stripped.len();
        stripped.push(self.status_query);
        (stripped, charge, true)
    }
}

/// GRBL dialect identity.
pub static GRBL: DialectDescriptor = DialectDescriptor {
    id: 0,
    name: "GRBL",
    buffer_capacity: 127,
    watermark_fraction: 0.90,
    status_query: '?',
    feed_hold: "!",
    cycle_resume: "~",
    queue_flush: "\u{18}",
    reset: "\u{18}",
    set_axis: "G92",
    home: "$H",
    home_takes_axes: false,
    probe: "G38.2",
    clear_alarm: "$X",
    system_info: "$I",
};

/// TinyG dialect identity.
pub static TINYG: DialectDescriptor = DialectDescriptor {
    id: 1,
    name: "TinyG",
    buffer_capacity: 254,
    watermark_fraction: 0.90,
    status_query: '?',
    feed_hold: "!",
    cycle_resume: "~",
    queue_flush: "%",
    reset: "\u{18}",
    set_axis: "G92",
    home: "G28.2",
    home_takes_axes: true,
    probe: "G38.2",
    clear_alarm: "{clear:n}",
    system_info: "{sys:n}",
};

/// g2core dialect identity.
pub static G2CORE: DialectDescriptor = DialectDescriptor {
    id: 2,
    name: "g2core",
    buffer_capacity: 254,
    watermark_fraction: 0.90,
    status_query: '?',
    feed_hold: "!",
    cycle_resume: "~",
    queue_flush: "%",
    reset: "\u{18}",
    set_axis: "G92",
    home: "G28.2",
    home_takes_axes: true,
    probe: "G38.2",
    clear_alarm: "{clear:n}",
    system_info: "{sys:n}",
};

/// Smoothieware dialect identity.
pub static SMOOTHIEWARE: DialectDescriptor = DialectDescriptor {
    id: 3,
    name: "Smoothieware",
    buffer_capacity: 127,
    watermark_fraction: 0.90,
    status_query: '?',
    feed_hold: "!",
    cycle_resume: "~",
    queue_flush: "\u{18}",
    reset: "\u{18}",
    set_axis: "G92",
    home: "$H",
    home_takes_axes: false,
    probe: "G38.2",
    clear_alarm: "M999",
    system_info: "version",
};

/// Polymorphic contract implemented by every firmware dialect.
///
/// Encode and decode each touch the pending byte-count FIFO from their own
/// direction; the queue itself is internally locked, so one writer context
/// and one reader context may run concurrently.
pub trait MachineInterface: Send {
    /// The dialect's static identity and command vocabulary.
    fn descriptor(&self) -> &'static DialectDescriptor;

    /// The receive-buffer flow-control model.
    fn buffer(&self) -> &InputBuffer;

    /// Snapshot of the controller status.
    fn status(&self) -> ControllerStatus;

    /// Record the positioning mode last sent to the controller.
    fn note_positioning(&mut self, mode: gcodestep_core::PositioningMode);

    /// Decode one inbound line into a normalized frame, updating buffer
    /// accounting and controller status as a side effect.
    fn decode(&mut self, line: &str) -> DecodedFrame;

    /// Encode a line for transmission.
    ///
    /// Realtime single-byte commands pass through unframed and unaccounted.
    /// Everything else is newline-terminated; with `bookkeep` the payload
    /// length is charged to the buffer model (status-query bytes accounted
    /// out-of-band).
    fn encode(&self, line: &str, bookkeep: bool) -> Vec<u8> {
        let descriptor = self.descriptor();
        if descriptor.is_realtime(line) {
            return line.as_bytes().to_vec();
        }

        let (payload, charge, has_query) = descriptor.coalesce_query(line);
        if bookkeep {
            if charge > 0 {
                self.buffer().charge(charge);
            }
            if has_query {
                self.buffer().charge_query();
            }
        }

        let mut bytes = payload.into_bytes();
        bytes.push(b'\n');
        bytes
    }

    /// Admission control: may `line` be sent without risking controller
    /// buffer overflow? Simulates the encode charge without bookkeeping and
    /// tests it against the watermark.
    fn ok_to_send(&self, line: &str) -> bool {
        let descriptor = self.descriptor();
        if descriptor.is_realtime(line) {
            return true;
        }
        let (_, charge, has_query) = descriptor.coalesce_query(line);
        self.buffer().fits(charge + usize::from(has_query))
    }

    /// Bytes currently assumed held by the controller.
    fn buffer_used(&self) -> usize {
        self.buffer().used()
    }

    /// Commands awaiting acknowledgment.
    fn pending_count(&self) -> usize {
        self.buffer().pending_count()
    }

    /// Reset buffer accounting (connect, soft reset, queue flush).
    fn flush(&self) {
        self.buffer().clear();
    }

    /// Build the homing command for the given axis letters.
    fn home_command(&self, axes: &str) -> String {
        let descriptor = self.descriptor();
        if descriptor.home_takes_axes && !axes.is_empty() {
            let words: Vec<String> = axes
                .chars()
                .filter(|c| "XYZABC".contains(c.to_ascii_uppercase()))
                .map(|c| format!("{}0", c.to_ascii_uppercase()))
                .collect();
            format!("{} {}", descriptor.home, words.join(" "))
        } else {
            descriptor.home.to_string()
        }
    }

    /// Build the set-axis (work origin) command.
    fn set_axis_command(&self, coords: &AxisCoords) -> String {
        format!("{} {}", self.descriptor().set_axis, coords.to_words())
    }

    /// Build a probe command along one axis.
    fn probe_command(&self, axis: char, feed_rate: f64, max_travel: f64) -> String {
        format!(
            "{} {}{:.3} F{:.0}",
            self.descriptor().probe,
            axis.to_ascii_uppercase(),
            max_travel,
            feed_rate
        )
    }

    /// Build a coordinated or rapid move command.
    fn move_command(&self, coords: &AxisCoords, rapid: bool) -> String {
        format!("{} {}", if rapid { "G0" } else { "G1" }, coords.to_words())
    }
}

/// Construct a fresh machine interface for the given dialect.
///
/// Each call returns an independent instance with its own buffer accounting
/// and status state; there are no process-wide singletons.
pub fn make_interface(controller: ControllerType) -> Box<dyn MachineInterface> {
    match controller {
        ControllerType::Grbl => Box::new(grbl::GrblInterface::new()),
        ControllerType::TinyG => Box::new(tinyg::TinyGInterface::new()),
        ControllerType::G2Core => Box::new(g2core::G2CoreInterface::new()),
        ControllerType::Smoothieware => Box::new(smoothie::SmoothieInterface::new()),
    }
}

/// Merge decoded status fields into the controller status snapshot.
pub(crate) fn apply_status_fields(status: &mut ControllerStatus, fields: &StatusFields) {
    if let Some(state) = fields.state {
        status.state = state;
    }
    if let Some(pos) = fields.machine_pos {
        status.machine_pos = pos;
    }
    if let Some(pos) = fields.work_pos {
        status.work_pos = pos;
    }
    if fields.velocity.is_some() {
        status.velocity = fields.velocity;
    }
    if fields.feed_rate.is_some() {
        status.feed_rate = fields.feed_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_type_names() {
        assert_eq!(ControllerType::from_name("grbl"), Some(ControllerType::Grbl));
        assert_eq!(
            ControllerType::from_name("Smoothie"),
            Some(ControllerType::Smoothieware)
        );
        assert_eq!(ControllerType::from_name("marlin"), None);
        assert_eq!(ControllerType::G2Core.to_string(), "g2core");
    }

    #[test]
    fn test_realtime_detection() {
        assert!(GRBL.is_realtime("!"));
        assert!(GRBL.is_realtime("~"));
        assert!(GRBL.is_realtime("\u{18}"));
        assert!(!GRBL.is_realtime("$H"));
        assert!(TINYG.is_realtime("%"));
        assert!(!GRBL.is_realtime("%"));
    }

    #[test]
    fn test_query_coalescing() {
        let (payload, charge, has_query) = GRBL.coalesce_query("??");
        assert_eq!(payload, "?");
        assert_eq!(charge, 0);
        assert!(has_query);

        let (payload, charge, has_query) = GRBL.coalesce_query("G0 X1?");
        assert_eq!(payload, "G0 X1?");
        assert_eq!(charge, 5);
        assert!(has_query);

        let (payload, charge, has_query) = GRBL.coalesce_query("G0 X1");
        assert_eq!(payload, "G0 X1");
        assert_eq!(charge, 5);
        assert!(!has_query);
    }

    #[test]
    fn test_factory_instances_are_independent() {
        let a = make_interface(ControllerType::Grbl);
        let b = make_interface(ControllerType::Grbl);
        a.buffer().charge(50);
        assert_eq!(a.buffer_used(), 50);
        assert_eq!(b.buffer_used(), 0);
    }
}
