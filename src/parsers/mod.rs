//! Log line grammars.
//!
//! Each grammar implements [`EntryParser`]. [`LogEntryParser`] chains them
//! (structured object first, then key=value) and falls back to showing the
//! raw line, so parsing a line never fails.

pub mod error;
pub mod json;
pub mod keyvalue;
pub mod token;

use anyhow::Result;

use crate::entry::ParsedEntry;

pub use error::ParseError;
pub use json::{FieldValue, JsonEntryParser};
pub use keyvalue::{KeyValueEntryParser, KeyValueParser};
pub use token::{Scanner, Token, TokenKind};

/// Which grammar produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Structured,
    KeyValue,
    Raw,
}

impl Grammar {
    pub fn name(self) -> &'static str {
        match self {
            Grammar::Structured => "structured",
            Grammar::KeyValue => "key/value",
            Grammar::Raw => "raw",
        }
    }
}

/// A single log grammar.
pub trait EntryParser: Send + Sync {
    fn grammar(&self) -> Grammar;
    fn parse(&self, line: &str) -> Result<ParsedEntry>;
}

/// Keys with a meaning of their own in both grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReservedKey {
    Message,
    Level,
    Time,
}

impl ReservedKey {
    pub(crate) fn classify(key: &str) -> Option<Self> {
        match key {
            "msg" | "message" => Some(ReservedKey::Message),
            "level" => Some(ReservedKey::Level),
            "time" => Some(ReservedKey::Time),
            _ => None,
        }
    }
}

/// Total parser: the first grammar that accepts a line wins.
pub struct LogEntryParser {
    grammars: Vec<Box<dyn EntryParser>>,
}

impl LogEntryParser {
    pub fn new() -> Self {
        Self {
            grammars: vec![
                Box::new(JsonEntryParser::new()),
                Box::new(KeyValueEntryParser::new()),
            ],
        }
    }

    pub fn parse(&self, line: &str) -> ParsedEntry {
        self.parse_detailed(line).0
    }

    /// Like [`parse`](Self::parse), also reporting which grammar matched.
    pub fn parse_detailed(&self, line: &str) -> (ParsedEntry, Grammar) {
        for grammar in &self.grammars {
            match grammar.parse(line) {
                Ok(entry) => return (entry, grammar.grammar()),
                Err(err) => {
                    tracing::trace!(grammar = grammar.grammar().name(), error = %err, "grammar rejected line");
                }
            }
        }
        (ParsedEntry::raw(line), Grammar::Raw)
    }
}

impl Default for LogEntryParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one line with the default grammar chain.
pub fn parse(line: &str) -> ParsedEntry {
    LogEntryParser::new().parse(line)
}
