//! Key=value (logfmt-style) grammar built on top of the token scanner.

use anyhow::Result;

use super::error::ParseError;
use super::token::{Scanner, Token, TokenKind};
use super::{EntryParser, Grammar, ReservedKey};
use crate::entry::{FieldPair, LogLevel, ParsedEntry};

/// Parse `line` into its ordered `(key, value)` pairs.
pub fn parse(line: &str) -> Result<Vec<FieldPair>, ParseError> {
    KeyValueParser::new(line).parse()
}

/// Recursive-descent parser over the token stream of one line.
///
/// Grammar: `line := (ws? pair)* ws? EOF`, `pair := IDENT '=' value?`,
/// `value := IDENT | STRING`. An unquoted value never contains `=`, so
/// `key2=val2=val` fails at the second `=`.
pub struct KeyValueParser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> KeyValueParser<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            scanner: Scanner::new(line),
        }
    }

    pub fn parse(mut self) -> Result<Vec<FieldPair>, ParseError> {
        let mut pairs = Vec::new();

        loop {
            let (at, token) = self.next_significant()?;
            let key = match token.kind {
                TokenKind::EndOfInput => return Ok(pairs),
                TokenKind::Identifier => token.literal,
                _ => {
                    return Err(ParseError::ExpectedKey {
                        at,
                        found: token.literal,
                    })
                }
            };

            let (at, token) = self.next_token()?;
            if token.kind != TokenKind::Equal {
                return Err(ParseError::ExpectedEqual {
                    at,
                    found: token.literal,
                });
            }

            let (at, token) = self.next_token()?;
            match token.kind {
                TokenKind::Identifier | TokenKind::QuotedString => {
                    pairs.push(FieldPair::new(key, token.literal));
                }
                // `key=` followed by a separator is an empty value
                TokenKind::Whitespace => pairs.push(FieldPair::new(key, String::new())),
                TokenKind::EndOfInput => {
                    pairs.push(FieldPair::new(key, String::new()));
                    return Ok(pairs);
                }
                TokenKind::Equal | TokenKind::Illegal => {
                    return Err(ParseError::ExpectedValue {
                        at,
                        found: token.literal,
                    })
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<(usize, Token), ParseError> {
        let at = self.scanner.position();
        let token = self.scanner.next_token()?;
        Ok((at, token))
    }

    fn next_significant(&mut self) -> Result<(usize, Token), ParseError> {
        loop {
            let (at, token) = self.next_token()?;
            if token.kind != TokenKind::Whitespace {
                return Ok((at, token));
            }
        }
    }
}

/// Entry parser for key=value lines.
pub struct KeyValueEntryParser;

impl KeyValueEntryParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeyValueEntryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser for KeyValueEntryParser {
    fn grammar(&self) -> Grammar {
        Grammar::KeyValue
    }

    fn parse(&self, line: &str) -> Result<ParsedEntry> {
        let pairs = parse(line)?;

        let mut entry = ParsedEntry::default();
        for pair in pairs {
            match ReservedKey::classify(&pair.key) {
                Some(ReservedKey::Message) => entry.message = pair.value,
                Some(ReservedKey::Level) => entry.level = LogLevel::from_name(&pair.value),
                Some(ReservedKey::Time) => {}
                None => entry.fields.push(pair),
            }
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<FieldPair> {
        items.iter().map(|(k, v)| FieldPair::new(*k, *v)).collect()
    }

    #[test]
    fn test_parse_pairs() {
        let cases: &[(&str, &[(&str, &str)])] = &[
            ("key=value", &[("key", "value")]),
            ("key=value key2=val2", &[("key", "value"), ("key2", "val2")]),
            (
                r#"key=value key2="val2=val""#,
                &[("key", "value"), ("key2", "val2=val")],
            ),
            (r#"key2="val2=val""#, &[("key2", "val2=val")]),
            ("", &[]),
            ("   \t ", &[]),
        ];

        for (input, expected) in cases {
            assert_eq!(parse(input).unwrap(), pairs(expected), "input {:?}", input);
        }
    }

    #[test]
    fn test_duplicate_keys_are_preserved_in_order() {
        assert_eq!(
            parse("a=1 b=2 a=3").unwrap(),
            pairs(&[("a", "1"), ("b", "2"), ("a", "3")])
        );
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(
            parse(r#"a= b="" c="#).unwrap(),
            pairs(&[("a", ""), ("b", ""), ("c", "")])
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(
            parse("  a=1\t\tb=2 \n").unwrap(),
            pairs(&[("a", "1"), ("b", "2")])
        );
    }

    #[test]
    fn test_unquoted_value_with_equals_is_rejected() {
        assert_eq!(
            parse("key2=val2=val"),
            Err(ParseError::ExpectedKey {
                at: 9,
                found: "=".to_string()
            })
        );
    }

    #[test]
    fn test_missing_equal() {
        assert_eq!(
            parse("not a log line at all"),
            Err(ParseError::ExpectedEqual {
                at: 3,
                found: " ".to_string()
            })
        );
        assert!(matches!(
            parse("lonely"),
            Err(ParseError::ExpectedEqual { at: 6, .. })
        ));
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(
            parse("=value"),
            Err(ParseError::ExpectedKey { at: 0, .. })
        ));
        assert!(matches!(
            parse(r#""quoted"=value"#),
            Err(ParseError::ExpectedKey { at: 0, .. })
        ));
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            parse("a==b"),
            Err(ParseError::ExpectedValue {
                at: 2,
                found: "=".to_string()
            })
        );
        assert!(matches!(
            parse("a=#"),
            Err(ParseError::ExpectedValue { at: 2, .. })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            parse(r#"a=1 b="open"#),
            Err(ParseError::UnterminatedString { at: 6 })
        );
    }

    #[test]
    fn test_entry_extracts_reserved_keys() {
        let entry = KeyValueEntryParser::new()
            .parse("time=2024-01-01T00:00:00Z level=info msg=hello host=a1")
            .unwrap();

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.fields, pairs(&[("host", "a1")]));
    }

    #[test]
    fn test_entry_message_alias_and_last_wins() {
        let entry = KeyValueEntryParser::new()
            .parse(r#"msg=first message="second one" level=WARN"#)
            .unwrap();

        assert_eq!(entry.message, "second one");
        assert_eq!(entry.level, LogLevel::Warning);
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_entry_rejects_plain_text() {
        assert!(KeyValueEntryParser::new()
            .parse("Started app in 3.1s")
            .is_err());
    }
}
