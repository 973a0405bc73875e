//! FTP Response handling
//!
//! Defines FTP response codes and the reply wire format:
//! `<code><sep><text>\r\n`, where `sep` is `-` on every line of a multi-line
//! reply except the last, which uses a space.

use std::fmt;

/// Standard FTP response codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_STATUS: u16 = 211;
pub const FILE_STATUS: u16 = 213;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const PENDING_FURTHER_INFO: u16 = 350;
pub const SERVICE_CLOSING: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const SYNTAX_ERROR: u16 = 500;
pub const ARGUMENT_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;
pub const NAME_NOT_ALLOWED: u16 = 553;
pub const INVALID_RESTART: u16 = 554;

/// A complete reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    /// Multi-line reply. The last line is the terminating one; an empty
    /// list degrades to a single empty line.
    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        if lines.is_empty() {
            return Self::new(code, "");
        }
        Self { code, lines }
    }

    /// Render the reply exactly as it goes on the wire.
    ///
    /// Continuation lines starting with a space (FEAT feature lines) are
    /// written verbatim, all other non-final lines get the `<code>-` prefix.
    pub fn to_wire(&self) -> String {
        let last = self.lines.len() - 1;
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i == last {
                out.push_str(&format!("{} {}\r\n", self.code, line));
            } else if i > 0 && line.starts_with(' ') {
                out.push_str(&format!("{line}\r\n"));
            } else {
                out.push_str(&format!("{}-{}\r\n", self.code, line));
            }
        }
        out
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wire = self.to_wire();
        f.write_str(wire.trim_end_matches("\r\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_reply() {
        assert_eq!(
            Reply::new(OK, "Type set to I").to_wire(),
            "200 Type set to I\r\n"
        );
    }

    #[test]
    fn multiline_reply_uses_dash_then_space() {
        let reply = Reply::multiline(
            SYSTEM_STATUS,
            vec!["SysInfo:".into(), "  Total connections: 3".into(), "End".into()],
        );
        assert_eq!(
            reply.to_wire(),
            "211-SysInfo:\r\n  Total connections: 3\r\n211 End\r\n"
        );
    }

    #[test]
    fn non_space_continuation_lines_get_prefixed() {
        let reply = Reply::multiline(SYSTEM_STATUS, vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(reply.to_wire(), "211-a\r\n211-b\r\n211 c\r\n");
    }

    #[test]
    fn empty_multiline_degrades_to_single_line() {
        assert_eq!(Reply::multiline(OK, vec![]).to_wire(), "200 \r\n");
    }
}
