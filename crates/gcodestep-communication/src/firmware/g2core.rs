//! g2core protocol dialect
//!
//! g2core inherits the TinyG wire protocol: one JSON object per line, an
//! `r` wrapper with an `f` footer acknowledging each buffered command, and
//! `sr` status reports. The status code space overlaps TinyG's but g2core
//! extends the error range, so the description table is kept separate.

use super::{
    apply_status_fields, json, AckFooter, DecodedFrame, DialectDescriptor, InputBuffer,
    MachineInterface, G2CORE,
};
use gcodestep_core::{ControllerStatus, MachineState, PositioningMode};
use serde_json::Value;

/// g2core machine interface.
pub struct G2CoreInterface {
    buffer: InputBuffer,
    status: ControllerStatus,
}

impl G2CoreInterface {
    /// Create a fresh interface with empty buffer accounting.
    pub fn new() -> Self {
        Self {
            buffer: InputBuffer::new(G2CORE.buffer_capacity, G2CORE.watermark_fraction),
            status: ControllerStatus::default(),
        }
    }
}

impl Default for G2CoreInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineInterface for G2CoreInterface {
    fn descriptor(&self) -> &'static DialectDescriptor {
        &G2CORE
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

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                if line.contains("g2core") || line.contains("G2 core") {
                    return DecodedFrame {
                        info: Some(line.to_string()),
                        ..Default::default()
                    };
                }
                tracing::debug!("Unparsed g2core line: {}", line);
                return DecodedFrame::empty();
            }
        };

        let mut frame = DecodedFrame::empty();

        if let Some(r) = value.get("r") {
            if let Some((success, code)) =
                json::parse_footer(r).or_else(|| json::parse_footer(&value))
            {
                let freed = self.buffer.acknowledge().unwrap_or(0);
                frame.ack = Some(AckFooter {
                    success,
                    code,
                    freed,
                });
                if code != 0 {
                    frame.info = Some(format!("error {} ({})", code, status_code_text(code)));
                }
            }

            if let Some(sr) = r.get("sr") {
                let fields = json::parse_status_report(sr);
                apply_status_fields(&mut self.status, &fields);
                self.buffer.note_status_report();
                frame.status = Some(fields);
            }
        }

        if let Some(sr) = value.get("sr") {
            let fields = json::parse_status_report(sr);
            apply_status_fields(&mut self.status, &fields);
            self.buffer.note_status_report();
            frame.status = Some(fields);
        }

        if let Some(er) = value.get("er") {
            let code = er.get("st").and_then(Value::as_i64).unwrap_or(-1);
            let message = er
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_else(|| status_code_text(code));
            self.status.state = MachineState::Alarm;
            frame.info = Some(format!("exception {} ({})", code, message));
        }

        if frame.is_empty() {
            tracing::debug!("Unrecognized g2core object: {}", line);
        }
        frame
    }
}

/// g2core status code descriptions.
pub fn status_code_text(code: i64) -> &'static str {
    match code {
        0 => "OK",
        1 => "Error",
        2 => "Eagain",
        3 => "No-op",
        4 => "Complete",
        20 => "Internal error",
        23 => "Divide by zero",
        26 => "Busy",
        27 => "Buffer full",
        28 => "Buffer full - fatal",
        100 => "Unrecognized name",
        101 => "Expected command letter",
        102 => "Bad number format",
        103 => "Unsupported type",
        104 => "Parameter is read-only",
        105 => "Parameter cannot be read",
        108 => "Gcode block skipped",
        130 => "Soft limit exceeded",
        132 => "Limit switch hit",
        134 => "Safety interlock",
        136 => "Homing cycle failed",
        140 => "Probe cycle failed",
        141 => "Probe travel too small",
        203 => "Machine alarmed",
        204 => "Machine shut down",
        205 => "Machine panicked",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_frees_charged_bytes() {
        let mut iface = G2CoreInterface::new();
        iface.encode("G0X10", true);
        assert_eq!(iface.buffer_used(), 5);

        let frame = iface.decode(r#"{"r":{"f":[1,0,5]}}"#);
        assert!(frame.ack.unwrap().success);
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_alarm_code_description() {
        let mut iface = G2CoreInterface::new();
        iface.encode("G0X1", true);
        let frame = iface.decode(r#"{"r":{"f":[1,203,4]}}"#);
        assert!(!frame.ack.unwrap().success);
        assert!(frame.info.unwrap().contains("Machine alarmed"));
    }

    #[test]
    fn test_status_report_with_stat() {
        let mut iface = G2CoreInterface::new();
        let frame = iface.decode(r#"{"sr":{"stat":9,"posz":-10.0}}"#);
        assert_eq!(frame.status.unwrap().state, Some(MachineState::Home));
        assert_eq!(iface.status().state, MachineState::Home);
    }

    #[test]
    fn test_banner() {
        let mut iface = G2CoreInterface::new();
        let frame = iface.decode("g2core ready");
        assert!(frame.info.is_some());
    }
}
