use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde_json::Value;

use super::{EntryParser, Grammar, ReservedKey};
use crate::entry::{LogLevel, ParsedEntry};

/// Closed set of value shapes a structured log line can carry.
///
/// `Display` is the canonical rendering used for field values: text as-is,
/// numbers in plain decimal, lists as `[a b]` and objects as `{k:v k2:v2}`,
/// applied recursively.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i128),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<FieldValue>),
    Object(IndexMap<String, FieldValue>),
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i as i128)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::Integer(u as i128)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Null => FieldValue::Null,
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            // f64's Display is the shortest round-trip form and never uses exponents
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => f.write_str("null"),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FieldValue::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Entry parser for lines holding one JSON object.
pub struct JsonEntryParser;

impl JsonEntryParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonEntryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser for JsonEntryParser {
    fn grammar(&self) -> Grammar {
        Grammar::Structured
    }

    fn parse(&self, line: &str) -> Result<ParsedEntry> {
        // Cheap rejection before handing plain text to serde
        if !line.trim_start().starts_with('{') {
            bail!("not a JSON object");
        }

        let value: Value = serde_json::from_str(line).context("Failed to parse JSON")?;
        let map = match value {
            Value::Object(map) => map,
            other => return Err(anyhow!("Expected JSON object, got {}", kind_name(&other))),
        };

        let mut entry = ParsedEntry::default();
        for (key, value) in map {
            match ReservedKey::classify(&key) {
                Some(ReservedKey::Message) => match value {
                    Value::String(text) => entry.message = text,
                    other => bail!("'{}' must be a string, got {}", key, kind_name(&other)),
                },
                Some(ReservedKey::Level) => match value {
                    Value::String(name) => entry.level = LogLevel::from_name(&name),
                    // Numeric levels (pino, bunyan) are not in the synonym table; keep them visible
                    other => {
                        entry.level = LogLevel::Unknown;
                        entry.push_field(key, FieldValue::from(&other).to_string());
                    }
                },
                Some(ReservedKey::Time) => {}
                None => {
                    let rendered = FieldValue::from(&value).to_string();
                    entry.push_field(key, rendered);
                }
            }
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FieldPair;
    use proptest::prelude::*;

    fn render(json: &str) -> String {
        let value: Value = serde_json::from_str(json).unwrap();
        FieldValue::from(&value).to_string()
    }

    #[test]
    fn test_json_parser_basic() {
        let entry = JsonEntryParser::new()
            .parse(r#"{"level":"error","msg":"boom","code":5}"#)
            .unwrap();

        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "boom");
        assert_eq!(entry.fields, vec![FieldPair::new("code", "5")]);
    }

    #[test]
    fn test_json_parser_drops_time_and_keeps_order() {
        let entry = JsonEntryParser::new()
            .parse(r#"{"time":"2024-01-01T00:00:00Z","zeta":"z","message":"hi","alpha":1.5}"#)
            .unwrap();

        assert_eq!(entry.message, "hi");
        assert_eq!(entry.level, LogLevel::Unknown);
        assert_eq!(
            entry.fields,
            vec![FieldPair::new("zeta", "z"), FieldPair::new("alpha", "1.5")]
        );
    }

    #[test]
    fn test_json_parser_rejects_non_text_message() {
        assert!(JsonEntryParser::new()
            .parse(r#"{"msg":{"nested":true}}"#)
            .is_err());
        assert!(JsonEntryParser::new().parse(r#"{"message":42}"#).is_err());
    }

    #[test]
    fn test_json_parser_keeps_numeric_level_as_field() {
        let entry = JsonEntryParser::new()
            .parse(r#"{"level":30,"msg":"pino style"}"#)
            .unwrap();

        assert_eq!(entry.level, LogLevel::Unknown);
        assert_eq!(entry.field("level"), Some("30"));
    }

    #[test]
    fn test_json_parser_rejects_non_objects() {
        let parser = JsonEntryParser::new();
        assert!(parser.parse("[1,2,3]").is_err());
        assert!(parser.parse(r#""just text""#).is_err());
        assert!(parser.parse("42").is_err());
        assert!(parser.parse("{broken").is_err());
        assert!(parser.parse("level=info").is_err());
    }

    #[test]
    fn test_json_parser_accepts_surrounding_whitespace() {
        let entry = JsonEntryParser::new()
            .parse("  {\"msg\":\"padded\"}  ")
            .unwrap();
        assert_eq!(entry.message, "padded");
    }

    #[test]
    fn test_canonical_scalars() {
        assert_eq!(render(r#""text""#), "text");
        assert_eq!(render("5"), "5");
        assert_eq!(render("-17"), "-17");
        assert_eq!(render("18446744073709551615"), "18446744073709551615");
        assert_eq!(render("1.5"), "1.5");
        assert_eq!(render("2.0"), "2");
        assert_eq!(render("1e21"), "1000000000000000000000");
        assert_eq!(render("true"), "true");
        assert_eq!(render("null"), "null");
    }

    #[test]
    fn test_canonical_collections() {
        assert_eq!(render(r#"[1,"two",[3,4]]"#), "[1 two [3 4]]");
        assert_eq!(render("[]"), "[]");
        assert_eq!(render(r#"{"a":1,"b":{"c":[true]}}"#), "{a:1 b:{c:[true]}}");
        assert_eq!(render("{}"), "{}");
    }

    #[test]
    fn test_nested_field_rendering_through_parser() {
        let entry = JsonEntryParser::new()
            .parse(r#"{"msg":"m","tags":["a","b"],"ctx":{"user":"u1","n":2}}"#)
            .unwrap();
        assert_eq!(entry.field("tags"), Some("[a b]"));
        assert_eq!(entry.field("ctx"), Some("{user:u1 n:2}"));
    }

    proptest! {
        #[test]
        fn prop_integers_render_as_decimal(n in any::<i64>()) {
            prop_assert_eq!(render(&n.to_string()), n.to_string());
        }

        #[test]
        fn prop_canonical_form_is_stable(items in proptest::collection::vec(any::<i32>(), 0..8)) {
            let json = serde_json::to_string(&items).unwrap();
            let expected = format!(
                "[{}]",
                items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
            );
            prop_assert_eq!(render(&json), expected.clone());
            prop_assert_eq!(render(&json), expected);
        }
    }
}
