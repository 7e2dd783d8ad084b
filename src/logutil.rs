//! Keeping player input and script text on one log line.

use std::fmt::Write;

/// Longest text, in characters, written to a log line.
const MAX_LOGGED_CHARS: usize = 200;

/// Escape control characters and cut long text so a log record stays on a
/// single line.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LOGGED_CHARS) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_LOGGED_CHARS {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// First `max` characters of `s`, with "..." appended when cut.
pub fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((at, _)) => format!("{}...", &s[..at]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_text_stays_on_one_line() {
        assert_eq!(escape_log("go\nnorth\t\u{7}"), "go\\nnorth\\t\\u{7}");
        let long = "x".repeat(MAX_LOGGED_CHARS + 10);
        assert_eq!(escape_log(&long).chars().count(), MAX_LOGGED_CHARS + 1);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("hi", 5), "hi");
    }
}
