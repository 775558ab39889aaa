//! Classification of single response lines.

/// Prefix of every unsolicited result code (and of some command results).
pub const URC_PREFIX: u8 = b'+';
pub const OK: &[u8] = b"OK";
pub const ERROR: &[u8] = b"ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Empty,
    /// `+ID: payload`, dispatched as an URC.
    Notification,
    Ok,
    Error,
    /// Intermediate result belonging to the in-flight command.
    Result,
}

/// Decides what a terminator-stripped line is.
///
/// `+CME ERROR: ...` is reported as [`LineKind::Notification`]; escalating it
/// is up to the URC dispatcher.
pub fn classify(line: &[u8]) -> LineKind {
    if line.is_empty() {
        LineKind::Empty
    } else if line[0] == URC_PREFIX {
        LineKind::Notification
    } else if line == OK {
        LineKind::Ok
    } else if line.starts_with(ERROR) {
        LineKind::Error
    } else {
        LineKind::Result
    }
}

/// Removes a trailing `\r\n`, or a lone `\n`, if present.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line)
}

/// Lossy text form of a line, for logs and error messages.
pub fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(b""), LineKind::Empty);
        assert_eq!(classify(b"+CSCON: 1"), LineKind::Notification);
        assert_eq!(classify(b"+CME ERROR: 4"), LineKind::Notification);
        assert_eq!(classify(b"OK"), LineKind::Ok);
        assert_eq!(classify(b"ERROR"), LineKind::Error);
        assert_eq!(classify(b"ERROR: 3"), LineKind::Error);
        assert_eq!(classify(b"NUESTATS: \"RADIO\",\"PCI\",4"), LineKind::Result);
        assert_eq!(classify(b"0"), LineKind::Result);
    }

    #[test]
    fn test_ok_must_match_exactly() {
        assert_eq!(classify(b"OK "), LineKind::Result);
        assert_eq!(classify(b"OKAY"), LineKind::Result);
        assert_eq!(classify(b" OK"), LineKind::Result);
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"OK\r\n"), b"OK");
        assert_eq!(strip_line_ending(b"OK\n"), b"OK");
        assert_eq!(strip_line_ending(b"\r\n"), b"");
        assert_eq!(strip_line_ending(b"AT\r"), b"AT\r");
        assert_eq!(strip_line_ending(b"OK"), b"OK");
    }
}
