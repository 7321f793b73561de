use thiserror::Error;

/// Failures of the key=value grammar. Offsets are byte positions in the line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected a key at offset {at}, found {found:?}")]
    ExpectedKey { at: usize, found: String },

    #[error("expected '=' at offset {at}, found {found:?}")]
    ExpectedEqual { at: usize, found: String },

    #[error("expected a value at offset {at}, found {found:?}")]
    ExpectedValue { at: usize, found: String },

    #[error("quoted string starting at offset {at} is never closed")]
    UnterminatedString { at: usize },
}
