//! Parsed log entries: the value type handed from the parsers to the formatters.

use std::fmt;

/// Severity recovered from a log line.
///
/// Variants are ordered from most to least severe after `Unknown`, which is
/// used both for lines without a level and for unrecognised level names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    #[default]
    Unknown,
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Map a level name to a variant, ignoring case. Anything outside the
    /// synonym table is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "crit" | "critical" | "panic" => LogLevel::Critical,
            "err" | "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warning,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Unknown,
        }
    }

    /// Fixed-width badge shown in front of every rendered entry
    pub fn badge(self) -> &'static str {
        match self {
            LogLevel::Critical => "CRT",
            LogLevel::Error => "ERR",
            LogLevel::Warning => "WRN",
            LogLevel::Info => "INF",
            LogLevel::Debug => "DBG",
            LogLevel::Unknown => "UNK",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.badge())
    }
}

/// One contextual `key=value` pair of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    pub key: String,
    pub value: String,
}

impl FieldPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Structured view of a single raw log line.
///
/// Fields keep the order in which the source emitted them, duplicates
/// included. Sorting is a presentation concern left to the formatter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedEntry {
    pub level: LogLevel,
    pub message: String,
    pub fields: Vec<FieldPair>,
}

impl ParsedEntry {
    /// Entry for a line no grammar understood: the text becomes the message.
    pub fn raw(line: &str) -> Self {
        Self {
            level: LogLevel::Unknown,
            message: line.to_string(),
            fields: Vec::new(),
        }
    }

    /// First value recorded under `key`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }

    pub(crate) fn push_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push(FieldPair::new(key, value));
    }
}
