//! Structured logging
//!
//! One log line per event, JSON-formatted, written synchronously and
//! unbuffered with deterministic key ordering (event first, severity next,
//! remaining fields alphabetical). No background threads; the coordinator
//! is single-threaded and its log stream must interleave predictably with
//! its side effects.

use std::fmt;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Lifecycle detail (transaction opened/closed, retry ticks)
    Debug = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues (hook failures, expiring whitelist)
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log an event to stdout.
pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
    log_to_writer(severity, event, fields, &mut io::stdout());
}

/// Log an event to stderr.
pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
    log_to_writer(severity, event, fields, &mut io::stderr());
}

/// Debug-level event on stdout.
pub fn debug(event: &str, fields: &[(&str, &str)]) {
    log(Severity::Debug, event, fields);
}

/// Info-level event on stdout.
pub fn info(event: &str, fields: &[(&str, &str)]) {
    log(Severity::Info, event, fields);
}

/// Warning on stderr.
pub fn warn(event: &str, fields: &[(&str, &str)]) {
    log_stderr(Severity::Warn, event, fields);
}

fn log_to_writer<W: Write>(
    severity: Severity,
    event: &str,
    fields: &[(&str, &str)],
    writer: &mut W,
) {
    let mut line = String::with_capacity(128);

    line.push_str("{\"event\":\"");
    escape_into(&mut line, event);
    line.push_str("\",\"severity\":\"");
    line.push_str(severity.as_str());
    line.push('"');

    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    for (key, value) in sorted {
        line.push_str(",\"");
        escape_into(&mut line, key);
        line.push_str("\":\"");
        escape_into(&mut line, value);
        line.push('"');
    }

    line.push_str("}\n");

    // One write_all call so lines do not interleave
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.flush();
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
