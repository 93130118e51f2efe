//! TinyG protocol dialect
//!
//! TinyG frames every response as one JSON object per line. A command
//! response arrives as `{"r":{...,"f":[success,code,freed]}}` whose footer
//! acknowledges exactly one buffered command; status reports arrive as
//! `{"sr":{...}}` either standalone or nested in a response.

use super::{
    apply_status_fields, json, AckFooter, DecodedFrame, DialectDescriptor, InputBuffer,
    MachineInterface, TINYG,
};
use gcodestep_core::{ControllerStatus, MachineState, PositioningMode};
use serde_json::Value;

/// TinyG machine interface.
pub struct TinyGInterface {
    buffer: InputBuffer,
    status: ControllerStatus,
}

impl TinyGInterface {
    /// Create a fresh interface with empty buffer accounting.
    pub fn new() -> Self {
        Self {
            buffer: InputBuffer::new(TINYG.buffer_capacity, TINYG.watermark_fraction),
            status: ControllerStatus::default(),
        }
    }
}

impl Default for TinyGInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineInterface for TinyGInterface {
    fn descriptor(&self) -> &'static DialectDescriptor {
        &TINYG
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
                // Startup text precedes the JSON stream on boot.
                if line.contains("TinyG") {
                    return DecodedFrame {
                        info: Some(line.to_string()),
                        ..Default::default()
                    };
                }
                tracing::debug!("Unparsed TinyG line: {}", line);
                return DecodedFrame::empty();
            }
        };

        let mut frame = DecodedFrame::empty();

        if let Some(r) = value.get("r") {
            // Footer may live inside the wrapper or at the top level.
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
            // Asynchronous exception report: diagnostic only, no ack slot.
            let code = er.get("st").and_then(Value::as_i64).unwrap_or(-1);
            let message = er
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_else(|| status_code_text(code));
            self.status.state = MachineState::Alarm;
            frame.info = Some(format!("exception {} ({})", code, message));
        }

        if frame.is_empty() {
            tracing::debug!("Unrecognized TinyG object: {}", line);
        }
        frame
    }
}

/// TinyG status code descriptions.
pub fn status_code_text(code: i64) -> &'static str {
    match code {
        0 => "OK",
        1 => "Generic error",
        2 => "Eagain",
        3 => "No-op",
        4 => "Complete",
        5 => "Terminated",
        6 => "Reset",
        7 => "End of line",
        8 => "End of file",
        9 => "File not open",
        20 => "Internal error",
        21 => "Internal range error",
        22 => "Floating point error",
        23 => "Divide by zero",
        24 => "Invalid address",
        26 => "Busy",
        27 => "Buffer full",
        28 => "Buffer full - fatal",
        100 => "Unrecognized command",
        101 => "Expected command letter",
        102 => "Bad number format",
        103 => "Input exceeds max length",
        104 => "Input value too small",
        105 => "Input value too large",
        108 => "Gcode block skipped",
        130 => "Soft limit exceeded",
        136 => "Homing cycle failed",
        140 => "Probe cycle failed",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_frees_charged_bytes() {
        let mut iface = TinyGInterface::new();
        iface.encode("G0X10", true);
        assert_eq!(iface.buffer_used(), 5);

        let frame = iface.decode(r#"{"r":{"f":[1,0,5]}}"#);
        let ack = frame.ack.unwrap();
        assert!(ack.success);
        assert_eq!(ack.freed, 5);
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_error_footer_describes_code() {
        let mut iface = TinyGInterface::new();
        iface.encode("G0X1", true);
        let frame = iface.decode(r#"{"r":{"f":[1,102,4]}}"#);
        let ack = frame.ack.unwrap();
        assert!(!ack.success);
        assert_eq!(ack.code, 102);
        assert!(frame.info.unwrap().contains("Bad number format"));
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_standalone_status_report() {
        let mut iface = TinyGInterface::new();
        let frame = iface.decode(r#"{"sr":{"stat":5,"posx":1.0,"posy":2.0,"posz":3.0,"vel":100.0}}"#);
        let fields = frame.status.unwrap();
        assert_eq!(fields.state, Some(MachineState::Run));
        assert_eq!(fields.work_pos.unwrap().y, 2.0);
        assert_eq!(iface.status().state, MachineState::Run);
        assert_eq!(iface.status().velocity, Some(100.0));
    }

    #[test]
    fn test_response_with_nested_status_and_footer() {
        let mut iface = TinyGInterface::new();
        iface.encode("G0X1", true);
        let frame = iface.decode(r#"{"r":{"sr":{"stat":1,"posx":0.0}},"f":[1,0,4]}"#);
        assert!(frame.ack.unwrap().success);
        assert_eq!(frame.status.unwrap().state, Some(MachineState::Idle));
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_exception_report_is_diagnostic_only() {
        let mut iface = TinyGInterface::new();
        iface.encode("G0X1", true);
        let frame = iface.decode(r#"{"er":{"st":136,"msg":"Homing cycle failed"}}"#);
        assert!(frame.ack.is_none());
        assert!(frame.info.unwrap().contains("Homing cycle failed"));
        // The pending slot is untouched; only footers consume slots.
        assert_eq!(iface.buffer_used(), 4);
        assert_eq!(iface.status().state, MachineState::Alarm);
    }

    #[test]
    fn test_non_json_banner() {
        let mut iface = TinyGInterface::new();
        let frame = iface.decode("TinyG ready");
        assert!(frame.info.unwrap().contains("TinyG"));
    }
}
