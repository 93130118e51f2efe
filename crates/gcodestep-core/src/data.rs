//! Data models for machine state, positions, and controller status
//!
//! This module provides:
//! - The controller state machine vocabulary shared by all firmware dialects
//! - Position tracking with full 6-axis support (X, Y, Z, A, B, C)
//! - Sparse per-axis coordinate sets for move/set-axis commands
//! - The normalized controller status snapshot mutated only by decode

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine state as reported by the controller firmware.
///
/// Each dialect maps its own wire representation (GRBL state words,
/// TinyG/g2core numeric `stat` codes) onto this shared vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineState {
    /// Controller booting or not yet reporting
    Init,
    /// Ready to accept motion commands
    #[default]
    Idle,
    /// Executing motion
    Run,
    /// Feed hold active
    Hold,
    /// Jogging
    Jog,
    /// Alarm lockout
    Alarm,
    /// Safety door open
    Door,
    /// G-code check mode
    Check,
    /// Homing cycle in progress
    Home,
    /// Sleep mode
    Sleep,
    /// Program stop
    Stop,
    /// Probe cycle in progress
    Probe,
    /// State could not be determined
    Unknown,
}

impl MachineState {
    /// True while the controller is actively moving (Run or Jog).
    ///
    /// Drives the auto-status poll scheduler: status queries are only
    /// repeated while the machine is in an active state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Run | Self::Jog)
    }

    /// True for the quiescent states that trigger a single opportunistic
    /// status query after a new write.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Stop | Self::Home | Self::Sleep | Self::Hold
        )
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::Idle => "Idle",
            Self::Run => "Run",
            Self::Hold => "Hold",
            Self::Jog => "Jog",
            Self::Alarm => "Alarm",
            Self::Door => "Door",
            Self::Check => "Check",
            Self::Home => "Home",
            Self::Sleep => "Sleep",
            Self::Stop => "Stop",
            Self::Probe => "Probe",
            Self::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// A 6-axis coordinate (X, Y, Z plus rotational A, B, C).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
    /// A-axis (4th axis) position
    pub a: f64,
    /// B-axis (5th axis) position
    pub b: f64,
    /// C-axis (6th axis) position
    pub c: f64,
}

impl Position {
    /// Create a position from linear axes only.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }
}

/// A sparse set of axis targets for move, jog, and set-axis commands.
///
/// Only the axes present are emitted into the generated G-code words.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisCoords {
    /// X-axis target, if commanded
    pub x: Option<f64>,
    /// Y-axis target, if commanded
    pub y: Option<f64>,
    /// Z-axis target, if commanded
    pub z: Option<f64>,
    /// A-axis target, if commanded
    pub a: Option<f64>,
    /// B-axis target, if commanded
    pub b: Option<f64>,
    /// C-axis target, if commanded
    pub c: Option<f64>,
}

impl AxisCoords {
    /// True when no axis is commanded.
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.a.is_none()
            && self.b.is_none()
            && self.c.is_none()
    }

    /// Format the present axes as G-code words (`X1.000 Y2.000 ...`).
    pub fn to_words(&self) -> String {
        let mut words = String::new();
        for (letter, value) in [
            ('X', self.x),
            ('Y', self.y),
            ('Z', self.z),
            ('A', self.a),
            ('B', self.b),
            ('C', self.c),
        ] {
            if let Some(v) = value {
                if !words.is_empty() {
                    words.push(' ');
                }
                words.push(letter);
                words.push_str(&format!("{:.3}", v));
            }
        }
        words
    }
}

impl fmt::Display for AxisCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_words())
    }
}

/// Positioning mode for motion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositioningMode {
    /// G90 absolute coordinates
    #[default]
    Absolute,
    /// G91 relative coordinates
    Relative,
}

impl PositioningMode {
    /// The modal G-code word selecting this mode.
    pub fn gcode(self) -> &'static str {
        match self {
            Self::Absolute => "G90",
            Self::Relative => "G91",
        }
    }
}

/// Normalized controller status snapshot.
///
/// Owned by the machine interface and mutated only by a successful decode of
/// a status frame; everything else reads it through the interface contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Current machine state
    pub state: MachineState,
    /// Last reported machine position
    pub machine_pos: Position,
    /// Last reported work position
    pub work_pos: Position,
    /// Last reported velocity (units per minute)
    pub velocity: Option<f64>,
    /// Last reported feed rate (units per minute)
    pub feed_rate: Option<f64>,
    /// Positioning mode last sent to the controller
    pub positioning: PositioningMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_activity() {
        assert!(MachineState::Run.is_active());
        assert!(MachineState::Jog.is_active());
        assert!(!MachineState::Idle.is_active());
        assert!(!MachineState::Alarm.is_active());
        assert!(MachineState::Hold.is_settled());
        assert!(!MachineState::Run.is_settled());
    }

    #[test]
    fn test_axis_words() {
        let coords = AxisCoords {
            x: Some(1.0),
            z: Some(-2.5),
            ..Default::default()
        };
        assert_eq!(coords.to_words(), "X1.000 Z-2.500");
        assert!(AxisCoords::default().is_empty());
    }

    #[test]
    fn test_positioning_gcode() {
        assert_eq!(PositioningMode::Absolute.gcode(), "G90");
        assert_eq!(PositioningMode::Relative.gcode(), "G91");
    }
}
