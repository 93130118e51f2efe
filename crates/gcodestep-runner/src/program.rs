//! Program sessions: source lines, program counter, and breakpoints
//!
//! A session is created by a Run or Step command and destroyed by Stop,
//! completion, or an abort. The program counter indexes the source line
//! about to be executed; breakpoint and MSG-directive checks exempt the
//! line the session started on, so resuming from a breakpoint does not
//! immediately re-break.

use std::collections::HashSet;

/// One run/step session over a G-code program.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    /// Source lines of the program.
    pub lines: Vec<String>,
    /// Line indices that suspend a run.
    pub breakpoints: HashSet<usize>,
    /// The line index the session started on (exempt from break checks).
    pub pc0: usize,
    /// Index of the line about to be executed.
    pub pc: usize,
}

impl ExecutionSession {
    /// Start a session at `pc` over `lines`.
    pub fn new(lines: Vec<String>, pc: usize, breakpoints: Vec<usize>) -> Self {
        Self {
            lines,
            breakpoints: breakpoints.into_iter().collect(),
            pc0: pc,
            pc,
        }
    }

    /// The line the program counter points at.
    pub fn current_line(&self) -> &str {
        &self.lines[self.pc]
    }

    /// True once the program counter has moved past the last line.
    pub fn at_end(&self) -> bool {
        self.pc >= self.lines.len()
    }

    /// True when a break check applies at the current line: the starting
    /// line of the session never re-breaks.
    pub fn break_checks_apply(&self) -> bool {
        self.pc != self.pc0
    }
}

/// Strip parenthesized and semicolon comments from a G-code line.
///
/// Returns the trimmed executable remainder, which may be empty.
pub fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_paren = false;
    for c in line.chars() {
        match c {
            '(' if !in_paren => in_paren = true,
            ')' if in_paren => in_paren = false,
            ';' if !in_paren => break,
            _ if !in_paren => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Extract the text of a `(MSG, ...)` directive, if the line carries one.
///
/// The directive tag is case-insensitive; the text is trimmed.
pub fn parse_msg_directive(line: &str) -> Option<String> {
    let open = line.find('(')?;
    let inner = &line[open + 1..];
    let close = inner.find(')')?;
    let inner = &inner[..close];

    let rest = inner.trim_start();
    if rest.len() < 4 || !rest[..3].eq_ignore_ascii_case("msg") {
        return None;
    }
    let rest = rest[3..].trim_start();
    let text = rest.strip_prefix(',')?;
    Some(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_paren_comment() {
        assert_eq!(strip_comments("G1 X10 (move over) Y20"), "G1 X10  Y20");
        assert_eq!(strip_comments("(whole line)"), "");
    }

    #[test]
    fn test_strip_semicolon_comment() {
        assert_eq!(strip_comments("G0 Z5 ; retract"), "G0 Z5");
        assert_eq!(strip_comments("; nothing here"), "");
    }

    #[test]
    fn test_semicolon_inside_paren_is_not_a_comment() {
        assert_eq!(strip_comments("G1 (a;b) X1"), "G1  X1");
    }

    #[test]
    fn test_msg_directive() {
        assert_eq!(
            parse_msg_directive("(MSG, change to tool 2)"),
            Some("change to tool 2".to_string())
        );
        assert_eq!(
            parse_msg_directive("(msg,lowercase works)"),
            Some("lowercase works".to_string())
        );
        assert_eq!(parse_msg_directive("(plain comment)"), None);
        assert_eq!(parse_msg_directive("G1 X1"), None);
        assert_eq!(parse_msg_directive("(MSGX not a directive)"), None);
    }

    #[test]
    fn test_session_break_exemption() {
        let session = ExecutionSession::new(
            vec!["G0 X1".into(), "G0 X2".into()],
            1,
            vec![1],
        );
        assert!(!session.break_checks_apply());
        assert!(session.breakpoints.contains(&1));
        assert_eq!(session.current_line(), "G0 X2");
    }

    #[test]
    fn test_session_end() {
        let mut session = ExecutionSession::new(vec!["G0 X1".into()], 0, vec![]);
        assert!(!session.at_end());
        session.pc = 1;
        assert!(session.at_end());
    }
}
