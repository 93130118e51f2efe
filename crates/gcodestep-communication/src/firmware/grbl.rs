//! GRBL protocol dialect
//!
//! Parses GRBL wire responses (status reports, acknowledgments, error and
//! alarm codes, version banners, setting echoes) into normalized frames and
//! maintains the receive-buffer model for the 127-byte GRBL serial buffer.
//!
//! Both the v1.1 pipe-delimited status format
//! (`<Idle|MPos:0.000,0.000,0.000|FS:0,0>`) and the legacy v0.9 comma format
//! (`<Run,MPos:1.000,2.000,3.000,WPos:1.000,2.000,3.000>`) are recognized.

use super::{
    apply_status_fields, AckFooter, DecodedFrame, DialectDescriptor, InputBuffer, MachineInterface,
    StatusFields, GRBL,
};
use gcodestep_core::{ControllerStatus, MachineState, Position, PositioningMode};

/// GRBL machine interface.
pub struct GrblInterface {
    buffer: InputBuffer,
    status: ControllerStatus,
}

impl GrblInterface {
    /// Create a fresh interface with empty buffer accounting.
    pub fn new() -> Self {
        Self {
            buffer: InputBuffer::new(GRBL.buffer_capacity, GRBL.watermark_fraction),
            status: ControllerStatus::default(),
        }
    }
}

impl Default for GrblInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineInterface for GrblInterface {
    fn descriptor(&self) -> &'static DialectDescriptor {
        &GRBL
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

        if line == "ok" {
            let freed = self.buffer.acknowledge().unwrap_or(0);
            return DecodedFrame {
                ack: Some(AckFooter {
                    success: true,
                    code: 0,
                    freed,
                }),
                ..Default::default()
            };
        }

        if let Some(code_str) = line.strip_prefix("error:") {
            let code = code_str.trim().parse::<i64>().unwrap_or(-1);
            let freed = self.buffer.acknowledge().unwrap_or(0);
            return DecodedFrame {
                ack: Some(AckFooter {
                    success: false,
                    code,
                    freed,
                }),
                info: Some(format!("error:{} ({})", code, error_text(code))),
                ..Default::default()
            };
        }

        if let Some(code_str) = line.strip_prefix("ALARM:") {
            // An alarm freezes the controller but does not consume a
            // command slot, so the pending queue is left alone.
            let code = code_str.trim().parse::<i64>().unwrap_or(-1);
            self.status.state = MachineState::Alarm;
            return DecodedFrame {
                info: Some(format!("ALARM:{} ({})", code, alarm_text(code))),
                ..Default::default()
            };
        }

        if line.starts_with('<') && line.ends_with('>') {
            let fields = parse_status_body(&line[1..line.len() - 1]);
            apply_status_fields(&mut self.status, &fields);
            self.buffer.note_status_report();
            return DecodedFrame {
                status: Some(fields),
                ..Default::default()
            };
        }

        if line.starts_with("Grbl ") {
            // Boot banner: the firmware just reset, so its receive buffer
            // is empty again.
            self.buffer.clear();
            self.status.state = MachineState::Idle;
            return DecodedFrame {
                info: Some(line.to_string()),
                ..Default::default()
            };
        }

        if line.starts_with('$') && line.contains('=') {
            return DecodedFrame {
                info: Some(line.to_string()),
                ..Default::default()
            };
        }

        if line.starts_with('[') && line.ends_with(']') {
            return DecodedFrame {
                info: Some(line.to_string()),
                ..Default::default()
            };
        }

        tracing::debug!("Unparsed GRBL line: {}", line);
        DecodedFrame::empty()
    }
}

/// Map a GRBL state word (optionally with a `:substate` suffix) onto the
/// shared machine-state vocabulary.
pub(crate) fn state_from_word(word: &str) -> MachineState {
    let base = word.split(':').next().unwrap_or(word);
    match base {
        "Idle" => MachineState::Idle,
        "Run" => MachineState::Run,
        "Hold" => MachineState::Hold,
        "Jog" => MachineState::Jog,
        "Alarm" => MachineState::Alarm,
        "Door" => MachineState::Door,
        "Check" => MachineState::Check,
        "Home" => MachineState::Home,
        "Sleep" => MachineState::Sleep,
        "Queue" => MachineState::Hold,
        _ => MachineState::Unknown,
    }
}

/// Parse the body of an angle-bracket status report (without the brackets).
///
/// Handles both the `|`-delimited v1.1 format and the legacy `,`-delimited
/// v0.9 format, where commas also separate the coordinates inside each
/// position field.
pub(crate) fn parse_status_body(body: &str) -> StatusFields {
    let state_end = body.find(['|', ',']).unwrap_or(body.len());
    let mut fields = StatusFields {
        state: Some(state_from_word(&body[..state_end])),
        ..Default::default()
    };

    if let Some(coords) = extract_coords(body, "MPos:") {
        fields.machine_pos = Some(coords);
    }
    if let Some(coords) = extract_coords(body, "WPos:") {
        fields.work_pos = Some(coords);
    }

    // Feed/speed pair (v1.1) or bare feed rate.
    if let Some(rest) = extract_after(body, "FS:") {
        let mut parts = rest.split(',');
        if let Some(feed) = parts.next().and_then(|s| s.trim().parse::<f64>().ok()) {
            fields.feed_rate = Some(feed);
            fields.velocity = Some(feed);
        }
    } else if let Some(rest) = extract_after(body, "F:") {
        if let Some(feed) = rest.split(',').next().and_then(|s| s.trim().parse::<f64>().ok()) {
            fields.feed_rate = Some(feed);
            fields.velocity = Some(feed);
        }
    }

    fields
}

/// Slice the text following `prefix` up to the next field separator.
fn extract_after<'a>(body: &'a str, prefix: &str) -> Option<&'a str> {
    let start = body.find(prefix)? + prefix.len();
    let rest = &body[start..];
    let end = rest.find('|').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Parse a run of comma-separated coordinates following `prefix`, stopping
/// at the first token that is not a plain number (the next legacy field).
fn extract_coords(body: &str, prefix: &str) -> Option<Position> {
    let rest = extract_after(body, prefix)?;
    let coords: Vec<f64> = rest
        .split(',')
        .map_while(|token| token.trim().parse::<f64>().ok())
        .collect();
    if coords.len() < 3 {
        return None;
    }
    Some(Position {
        x: coords[0],
        y: coords[1],
        z: coords[2],
        a: coords.get(3).copied().unwrap_or(0.0),
        b: coords.get(4).copied().unwrap_or(0.0),
        c: coords.get(5).copied().unwrap_or(0.0),
    })
}

/// GRBL v1.1 error code descriptions.
pub fn error_text(code: i64) -> &'static str {
    match code {
        1 => "G-code word letter not found",
        2 => "Numeric value format invalid",
        3 => "'$' system command not recognized",
        4 => "Negative value for expected positive value",
        5 => "Homing not enabled in settings",
        6 => "Step pulse time too short",
        7 => "EEPROM read failed",
        8 => "'$' command only valid when idle",
        9 => "G-code locked out during alarm or jog",
        10 => "Soft limits require homing to be enabled",
        11 => "Max characters per line exceeded",
        12 => "Setting exceeds max step rate",
        13 => "Safety door opened",
        14 => "Startup line exceeds EEPROM line length",
        15 => "Jog target exceeds machine travel",
        16 => "Invalid jog command",
        17 => "Laser mode requires PWM output",
        20 => "Unsupported or invalid g-code command",
        21 => "More than one command from the same modal group",
        22 => "Feed rate not set or undefined",
        23 => "Command requires an integer value",
        24 => "Two commands competing for the same axis words",
        25 => "A g-code word was repeated in the block",
        26 => "Command requires axis words, none found",
        27 => "Line number out of range",
        28 => "Command missing required P or L value words",
        29 => "Unsupported work coordinate system",
        30 => "G53 requires G0 or G1 motion mode",
        31 => "Unused axis words with G80 active",
        32 => "Arc has no axis words in the selected plane",
        33 => "Motion target invalid",
        34 => "Arc radius definition error",
        35 => "Arc missing IJK offset word",
        36 => "Unused leftover g-code words",
        37 => "Dynamic tool length offset on wrong axis",
        38 => "Tool number exceeds supported maximum",
        _ => "Unknown",
    }
}

/// GRBL v1.1 alarm code descriptions.
pub fn alarm_text(code: i64) -> &'static str {
    match code {
        1 => "Hard limit triggered; position likely lost",
        2 => "Soft limit: motion target exceeds machine travel",
        3 => "Reset while in motion; position lost",
        4 => "Probe fail: probe not in expected initial state",
        5 => "Probe fail: probe did not contact within travel",
        6 => "Homing fail: reset during homing cycle",
        7 => "Homing fail: safety door opened during homing",
        8 => "Homing fail: could not clear limit switch",
        9 => "Homing fail: limit switch not found within travel",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_frees_pending() {
        let mut iface = GrblInterface::new();
        iface.encode("G0 X10 Y20", true);
        assert_eq!(iface.buffer_used(), 10);

        let frame = iface.decode("ok");
        let ack = frame.ack.unwrap();
        assert!(ack.success);
        assert_eq!(ack.freed, 10);
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_error_frees_pending_and_describes() {
        let mut iface = GrblInterface::new();
        iface.encode("G1 X5", true);
        let frame = iface.decode("error:20");
        let ack = frame.ack.unwrap();
        assert!(!ack.success);
        assert_eq!(ack.code, 20);
        assert_eq!(ack.freed, 5);
        assert!(frame.info.unwrap().contains("Unsupported or invalid"));
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_unknown_error_code_never_fails() {
        let mut iface = GrblInterface::new();
        iface.encode("G1 X5", true);
        let frame = iface.decode("error:200");
        assert!(frame.info.unwrap().contains("Unknown"));
    }

    #[test]
    fn test_alarm_sets_state_without_pop() {
        let mut iface = GrblInterface::new();
        iface.encode("G1 X5", true);
        let frame = iface.decode("ALARM:1");
        assert!(frame.ack.is_none());
        assert!(frame.info.unwrap().contains("Hard limit"));
        assert_eq!(iface.status().state, MachineState::Alarm);
        assert_eq!(iface.buffer_used(), 5);
    }

    #[test]
    fn test_legacy_comma_status() {
        let mut iface = GrblInterface::new();
        let frame = iface.decode("<Run,MPos:1.000,2.000,3.000,WPos:1.000,2.000,3.000>");
        let fields = frame.status.unwrap();
        assert_eq!(fields.state, Some(MachineState::Run));
        let mpos = fields.machine_pos.unwrap();
        assert_eq!(mpos.x, 1.0);
        assert_eq!(mpos.y, 2.0);
        assert_eq!(mpos.z, 3.0);
        let wpos = fields.work_pos.unwrap();
        assert_eq!(wpos.x, 1.0);
        assert_eq!(iface.status().state, MachineState::Run);
    }

    #[test]
    fn test_v11_pipe_status_with_feed() {
        let mut iface = GrblInterface::new();
        let frame = iface.decode("<Hold:0|MPos:5.000,0.000,-1.500|FS:500,8000>");
        let fields = frame.status.unwrap();
        assert_eq!(fields.state, Some(MachineState::Hold));
        assert_eq!(fields.machine_pos.unwrap().z, -1.5);
        assert_eq!(fields.feed_rate, Some(500.0));
    }

    #[test]
    fn test_watermark_rejects_oversized_line() {
        let iface = GrblInterface::new();
        // Capacity 127, watermark 114.3: a 120-byte line must be refused
        // even with the buffer empty.
        let long = "G1 ".repeat(40);
        assert_eq!(long.len(), 120);
        assert!(!iface.ok_to_send(&long));
        assert!(iface.ok_to_send("G1 X1"));
    }

    #[test]
    fn test_status_query_encoding() {
        let iface = GrblInterface::new();
        let bytes = iface.encode("??", true);
        assert_eq!(bytes, b"?\n");
        assert_eq!(iface.buffer_used(), 1);
        assert_eq!(iface.pending_count(), 0);
    }

    #[test]
    fn test_banner_clears_accounting() {
        let mut iface = GrblInterface::new();
        iface.encode("G0 X1", true);
        let frame = iface.decode("Grbl 1.1h ['$' for help]");
        assert!(frame.info.unwrap().starts_with("Grbl 1.1"));
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_realtime_bypasses_accounting() {
        let iface = GrblInterface::new();
        assert_eq!(iface.encode("!", true), b"!");
        assert_eq!(iface.encode("~", true), b"~");
        assert_eq!(iface.buffer_used(), 0);
    }

    #[test]
    fn test_setting_echo_is_info() {
        let mut iface = GrblInterface::new();
        let frame = iface.decode("$110=6000.000");
        assert_eq!(frame.info.unwrap(), "$110=6000.000");
        assert!(frame.ack.is_none());
    }
}
