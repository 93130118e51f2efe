//! Smoothieware protocol dialect
//!
//! Smoothieware speaks a GRBL-compatible text protocol with a few firmware
//! specific additions: a `Build version:` banner, `M114` position echoes in
//! `ok C: X:.. Y:.. Z:..` form, and a `HALTED` lockout cleared by `M999`.
//! An acknowledgment and a position echo can share one line, so decode
//! recognizes both compositely.

use super::{
    apply_status_fields, grbl, AckFooter, DecodedFrame, DialectDescriptor, InputBuffer,
    MachineInterface, StatusFields, SMOOTHIEWARE,
};
use gcodestep_core::{ControllerStatus, MachineState, Position, PositioningMode};

/// Smoothieware machine interface.
pub struct SmoothieInterface {
    buffer: InputBuffer,
    status: ControllerStatus,
}

impl SmoothieInterface {
    /// Create a fresh interface with empty buffer accounting.
    pub fn new() -> Self {
        Self {
            buffer: InputBuffer::new(
                SMOOTHIEWARE.buffer_capacity,
                SMOOTHIEWARE.watermark_fraction,
            ),
            status: ControllerStatus::default(),
        }
    }
}

impl Default for SmoothieInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineInterface for SmoothieInterface {
    fn descriptor(&self) -> &'static DialectDescriptor {
        &SMOOTHIEWARE
    }

    fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    fn status(&self) -> ControllerStatus {
        self.status.clone()
    }

    fn note_positioning(&mut self, mode: PositioningMode) {
        self.status.positioning = mode;
    }

    fn decode(&mut self, line: &str) -> DecodedFrame {
        let line = line.trim();
        if line.is_empty() {
            return DecodedFrame::empty();
        }

        let mut frame = DecodedFrame::empty();

        // Acknowledgment, possibly with a trailing M114 echo on the same
        // line ("ok C: X:0.000 ...").
        let rest = if line.eq_ignore_ascii_case("ok") {
            ""
        } else if let Some(rest) = line.strip_prefix("ok ").or_else(|| line.strip_prefix("OK ")) {
            rest
        } else {
            line
        };

        if rest.len() < line.len() || rest.is_empty() {
            let freed = self.buffer.acknowledge().unwrap_or(0);
            frame.ack = Some(AckFooter {
                success: true,
                code: 0,
                freed,
            });
        }

        if rest.is_empty() {
            return frame;
        }

        if let Some(message) = rest
            .strip_prefix("error:")
            .or_else(|| rest.strip_prefix("Error:"))
        {
            let freed = self.buffer.acknowledge().unwrap_or(0);
            frame.ack = Some(AckFooter {
                success: false,
                code: message.trim().parse::<i64>().unwrap_or(-1),
                freed,
            });
            frame.info = Some(format!("error: {}", message.trim()));
            return frame;
        }

        if rest.contains("HALTED") || rest.starts_with("ALARM") {
            self.status.state = MachineState::Alarm;
            frame.info = Some(format!("{} (send M999 to clear)", rest));
            return frame;
        }

        if rest.starts_with('<') && rest.ends_with('>') {
            let fields = grbl::parse_status_body(&rest[1..rest.len() - 1]);
            apply_status_fields(&mut self.status, &fields);
            self.buffer.note_status_report();
            frame.status = Some(fields);
            return frame;
        }

        // M114 position echo: "C: X:1.000 Y:2.000 Z:3.000"
        if rest.contains("X:") && rest.contains("Y:") && rest.contains("Z:") {
            if let Some(pos) = parse_m114(rest) {
                let fields = StatusFields {
                    work_pos: Some(pos),
                    ..Default::default()
                };
                apply_status_fields(&mut self.status, &fields);
                frame.status = Some(fields);
                return frame;
            }
        }

        if rest.starts_with("Build version:") || rest.starts_with("Smoothie") {
            frame.info = Some(rest.to_string());
            return frame;
        }

        if frame.is_empty() {
            tracing::debug!("Unparsed Smoothieware line: {}", line);
        }
        frame
    }
}

/// Parse an M114-style `X:.. Y:.. Z:..` position echo.
fn parse_m114(line: &str) -> Option<Position> {
    let mut pos = Position::default();
    let mut seen = 0;
    for token in line.split_whitespace() {
        if let Some(value) = token.strip_prefix("X:") {
            if let Ok(v) = value.parse::<f64>() {
                pos.x = v;
                seen += 1;
            }
        } else if let Some(value) = token.strip_prefix("Y:") {
            if let Ok(v) = value.parse::<f64>() {
                pos.y = v;
                seen += 1;
            }
        } else if let Some(value) = token.strip_prefix("Z:") {
            if let Ok(v) = value.parse::<f64>() {
                pos.z = v;
                seen += 1;
            }
        }
    }
    (seen >= 3).then_some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_case_insensitive() {
        let mut iface = SmoothieInterface::new();
        iface.encode("G0 X1", true);
        let frame = iface.decode("OK");
        assert!(frame.ack.unwrap().success);
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_halted_sets_alarm() {
        let mut iface = SmoothieInterface::new();
        let frame = iface.decode("ALARM: Kill button pressed - reset or M999 to continue");
        assert!(frame.info.unwrap().contains("M999"));
        assert_eq!(iface.status().state, MachineState::Alarm);
    }

    #[test]
    fn test_composite_ack_and_position_echo() {
        let mut iface = SmoothieInterface::new();
        iface.encode("M114", true);
        let frame = iface.decode("ok C: X:10.000 Y:-2.500 Z:0.100");

        // One line carries both the acknowledgment and the echo.
        assert!(frame.ack.unwrap().success);
        assert_eq!(iface.buffer_used(), 0);

        let pos = frame.status.unwrap().work_pos.unwrap();
        assert_eq!(pos.x, 10.0);
        assert_eq!(pos.y, -2.5);
        assert_eq!(pos.z, 0.1);
    }

    #[test]
    fn test_status_report_shared_format() {
        let mut iface = SmoothieInterface::new();
        let frame = iface.decode("<Idle|MPos:0.000,0.000,0.000|WPos:0.000,0.000,0.000>");
        assert_eq!(frame.status.unwrap().state, Some(MachineState::Idle));
    }

    #[test]
    fn test_build_version_banner() {
        let mut iface = SmoothieInterface::new();
        let frame =
            iface.decode("Build version: edge-94de12c, Build date: Oct 28 2017, MCU: LPC1769");
        assert!(frame.info.unwrap().starts_with("Build version:"));
    }
}
