//! Shared parsing helpers for the TinyG/g2core JSON protocol family
//!
//! Both firmwares frame every response as a single JSON object per line:
//! `r` wraps command responses (with an `f` footer triple), `sr` carries
//! status reports, and `er` carries asynchronous exception reports.

use super::StatusFields;
use gcodestep_core::{MachineState, Position};
use serde_json::Value;

/// Map a `stat` numeric code onto the shared machine-state vocabulary.
///
/// The code space is shared between TinyG and g2core.
pub(crate) fn state_from_stat(code: i64) -> MachineState {
    match code {
        0 => MachineState::Init,
        1 => MachineState::Idle,
        2 => MachineState::Alarm,
        3 => MachineState::Stop,
        4 => MachineState::Stop, // program end
        5 => MachineState::Run,
        6 => MachineState::Hold,
        7 => MachineState::Probe,
        8 => MachineState::Run, // cycle
        9 => MachineState::Home,
        10 => MachineState::Jog,
        11 => MachineState::Jog, // interlock still moving
        12 | 13 => MachineState::Alarm, // shutdown, panic
        _ => MachineState::Unknown,
    }
}

/// Extract normalized status fields from an `sr` object.
///
/// Understands the current `posx..posc` keys, the legacy `mpox..mpoc`
/// machine-position keys, and `vel`.
pub(crate) fn parse_status_report(sr: &Value) -> StatusFields {
    let mut fields = StatusFields::default();

    if let Some(stat) = sr.get("stat").and_then(Value::as_i64) {
        fields.state = Some(state_from_stat(stat));
    }

    if let Some(pos) = read_position(sr, &["posx", "posy", "posz", "posa", "posb", "posc"]) {
        fields.work_pos = Some(pos);
    }

    if let Some(pos) = read_position(sr, &["mpox", "mpoy", "mpoz", "mpoa", "mpob", "mpoc"]) {
        fields.machine_pos = Some(pos);
    }

    if let Some(vel) = sr.get("vel").and_then(Value::as_f64) {
        fields.velocity = Some(vel);
    }

    if let Some(feed) = sr.get("feed").and_then(Value::as_f64) {
        fields.feed_rate = Some(feed);
    }

    fields
}

/// Read a position from per-axis keys, if any of them is present.
fn read_position(sr: &Value, keys: &[&str; 6]) -> Option<Position> {
    let axis = |k: &str| sr.get(k).and_then(Value::as_f64);
    if keys.iter().all(|k| axis(k).is_none()) {
        return None;
    }
    Some(Position {
        x: axis(keys[0]).unwrap_or(0.0),
        y: axis(keys[1]).unwrap_or(0.0),
        z: axis(keys[2]).unwrap_or(0.0),
        a: axis(keys[3]).unwrap_or(0.0),
        b: axis(keys[4]).unwrap_or(0.0),
        c: axis(keys[5]).unwrap_or(0.0),
    })
}

/// Extract the `f` footer triple `[success, code, freed_bytes]`.
///
/// The footer may sit inside the `r` wrapper or at the top level depending
/// on firmware version; callers pass the object they found it in.
pub(crate) fn parse_footer(obj: &Value) -> Option<(bool, i64)> {
    let f = obj.get("f")?.as_array()?;
    let success = f.first().and_then(Value::as_i64).unwrap_or(0) != 0;
    let code = f.get(1).and_then(Value::as_i64).unwrap_or(0);
    Some((success && code == 0, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stat_mapping() {
        assert_eq!(state_from_stat(1), MachineState::Idle);
        assert_eq!(state_from_stat(5), MachineState::Run);
        assert_eq!(state_from_stat(6), MachineState::Hold);
        assert_eq!(state_from_stat(9), MachineState::Home);
        assert_eq!(state_from_stat(13), MachineState::Alarm);
        assert_eq!(state_from_stat(99), MachineState::Unknown);
    }

    #[test]
    fn test_sr_with_current_keys() {
        let sr = json!({"stat": 5, "posx": 1.0, "posy": 2.0, "posz": 3.0, "vel": 120.5});
        let fields = parse_status_report(&sr);
        assert_eq!(fields.state, Some(MachineState::Run));
        let pos = fields.work_pos.unwrap();
        assert_eq!((pos.x, pos.y, pos.z), (1.0, 2.0, 3.0));
        assert_eq!(fields.velocity, Some(120.5));
        assert!(fields.machine_pos.is_none());
    }

    #[test]
    fn test_sr_with_legacy_machine_keys() {
        let sr = json!({"mpox": -5.0, "mpoy": 0.0, "mpoz": 2.5});
        let fields = parse_status_report(&sr);
        let pos = fields.machine_pos.unwrap();
        assert_eq!(pos.x, -5.0);
        assert_eq!(pos.z, 2.5);
    }

    #[test]
    fn test_footer_parse() {
        let r = json!({"f": [1, 0, 5]});
        assert_eq!(parse_footer(&r), Some((true, 0)));
        let r = json!({"f": [1, 102, 5]});
        assert_eq!(parse_footer(&r), Some((false, 102)));
        assert_eq!(parse_footer(&json!({})), None);
    }
}
