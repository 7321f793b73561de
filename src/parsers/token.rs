//! Lexer for key=value log lines.
//!
//! The scanner works on a `&str` and never looks further ahead than the
//! current character, except to finish a quoted string or identifier run.

use super::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    QuotedString,
    Equal,
    Whitespace,
    Illegal,
    EndOfInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }

    fn end_of_input() -> Self {
        Self::new(TokenKind::EndOfInput, String::new())
    }
}

/// Separator characters between pairs
pub(crate) fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n')
}

/// Characters allowed in keys and unquoted values. `#` is kept out so that
/// comment-like lines never look like key=value data.
pub(crate) fn is_ident_char(ch: char) -> bool {
    !ch.is_whitespace() && !ch.is_control() && !matches!(ch, '=' | '"' | '#')
}

/// Scan one token from the front of `input`, returning it with the rest of
/// the input.
pub fn scan(input: &str) -> Result<(Token, &str), ParseError> {
    let mut scanner = Scanner::new(input);
    let token = scanner.next_token()?;
    Ok((token, scanner.remaining()))
}

/// Incremental tokenizer over a single line.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            finished: false,
        }
    }

    /// Byte offset of the next unread character
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let rest = self.remaining();
        let Some(ch) = rest.chars().next() else {
            return Ok(Token::end_of_input());
        };

        let (token, consumed) = if is_whitespace(ch) {
            let end = rest
                .find(|c: char| !is_whitespace(c))
                .unwrap_or(rest.len());
            (Token::new(TokenKind::Whitespace, ch), end)
        } else if ch == '=' {
            (Token::new(TokenKind::Equal, "="), 1)
        } else if ch == '"' {
            match self.scan_quoted(rest) {
                Ok(scanned) => scanned,
                Err(err) => {
                    // An open quote swallows the rest of the line.
                    self.pos = self.src.len();
                    return Err(err);
                }
            }
        } else if is_ident_char(ch) {
            let end = rest
                .find(|c: char| !is_ident_char(c))
                .unwrap_or(rest.len());
            (Token::new(TokenKind::Identifier, &rest[..end]), end)
        } else {
            (Token::new(TokenKind::Illegal, ch), ch.len_utf8())
        };

        self.pos += consumed;
        Ok(token)
    }

    /// `rest` starts with the opening quote. Only `\"` is an escape; any other
    /// backslash pair is kept as written.
    fn scan_quoted(&self, rest: &str) -> Result<(Token, usize), ParseError> {
        let body = &rest[1..];
        let mut literal = String::with_capacity(body.len());
        let mut chars = body.char_indices();

        while let Some((idx, ch)) = chars.next() {
            match ch {
                '"' => {
                    let consumed = 1 + idx + 1;
                    return Ok((Token::new(TokenKind::QuotedString, literal), consumed));
                }
                '\\' => match chars.next() {
                    Some((_, '"')) => literal.push('"'),
                    Some((_, other)) => {
                        literal.push('\\');
                        literal.push(other);
                    }
                    None => literal.push('\\'),
                },
                _ => literal.push(ch),
            }
        }

        Err(ParseError::UnterminatedString { at: self.pos })
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, ParseError>;

    /// Yields every token up to and including `EndOfInput`, or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::EndOfInput => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(input: &str) -> Token {
        scan(input).unwrap().0
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        Scanner::new(input)
            .map(|token| token.unwrap().kind)
            .collect()
    }

    #[test]
    fn test_scan_single_tokens() {
        let cases: &[(&str, TokenKind, &str)] = &[
            ("", TokenKind::EndOfInput, ""),
            ("#", TokenKind::Illegal, "#"),
            (" ", TokenKind::Whitespace, " "),
            ("\t", TokenKind::Whitespace, "\t"),
            ("\n", TokenKind::Whitespace, "\n"),
            ("=", TokenKind::Equal, "="),
            ("foo", TokenKind::Identifier, "foo"),
            (r#""a b c""#, TokenKind::QuotedString, "a b c"),
            (r#""abc""#, TokenKind::QuotedString, "abc"),
            (r#""a""#, TokenKind::QuotedString, "a"),
            (r#""""#, TokenKind::QuotedString, ""),
            (r#""\"""#, TokenKind::QuotedString, "\""),
        ];

        for (input, kind, literal) in cases {
            let token = first(input);
            assert_eq!(token.kind, *kind, "kind mismatch for {:?}", input);
            assert_eq!(token.literal, *literal, "literal mismatch for {:?}", input);
        }
    }

    #[test]
    fn test_empty_input_is_only_end_of_input() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
    }

    #[test]
    fn test_hash_is_one_illegal_token() {
        let tokens: Vec<Token> = Scanner::new("#").map(Result::unwrap).collect();
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Illegal, "#"),
                Token::new(TokenKind::EndOfInput, "")
            ]
        );
    }

    #[test]
    fn test_whitespace_runs_coalesce_to_first_character() {
        let (token, rest) = scan("\t  \n x").unwrap();
        assert_eq!(token, Token::new(TokenKind::Whitespace, "\t"));
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_identifier_stops_at_separators() {
        let (token, rest) = scan("path=/api/v1").unwrap();
        assert_eq!(token, Token::new(TokenKind::Identifier, "path"));
        assert_eq!(rest, "=/api/v1");

        let (token, rest) = scan(rest).unwrap();
        assert_eq!(token.kind, TokenKind::Equal);
        let (token, rest) = scan(rest).unwrap();
        assert_eq!(token, Token::new(TokenKind::Identifier, "/api/v1"));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_identifier_accepts_unicode_and_punctuation() {
        assert_eq!(
            first("größe:1.5ms,{a}"),
            Token::new(TokenKind::Identifier, "größe:1.5ms,{a}")
        );
    }

    #[test]
    fn test_quoted_string_keeps_other_escapes() {
        let token = first(r#""tab\tand\\slash""#);
        assert_eq!(token.literal, r"tab\tand\\slash");
    }

    #[test]
    fn test_quoted_string_may_hold_equals_and_spaces() {
        let (token, rest) = scan(r#""val2=val x" tail"#).unwrap();
        assert_eq!(token, Token::new(TokenKind::QuotedString, "val2=val x"));
        assert_eq!(rest, " tail");
    }

    #[test]
    fn test_unterminated_string_fails_and_consumes_input() {
        let mut scanner = Scanner::new(r#"key="never closed"#);
        assert_eq!(scanner.next_token().unwrap().kind, TokenKind::Identifier);
        assert_eq!(scanner.next_token().unwrap().kind, TokenKind::Equal);
        assert_eq!(
            scanner.next_token(),
            Err(ParseError::UnterminatedString { at: 4 })
        );
        assert_eq!(scanner.remaining(), "");
    }

    #[test]
    fn test_escaped_quote_at_end_does_not_close() {
        assert!(matches!(
            scan(r#""abc\""#),
            Err(ParseError::UnterminatedString { at: 0 })
        ));
    }

    #[test]
    fn test_control_characters_are_illegal() {
        assert_eq!(first("\r"), Token::new(TokenKind::Illegal, "\r"));
        assert_eq!(first("\u{1b}[0m"), Token::new(TokenKind::Illegal, "\u{1b}"));
    }

    #[test]
    fn test_full_line_token_stream() {
        assert_eq!(
            kinds(r#"a=1 b="x y""#),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::QuotedString,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_stepping_then_iterating_continues_the_stream() {
        let mut scanner = Scanner::new("k=v");
        assert_eq!(
            scanner.next_token().unwrap(),
            Token::new(TokenKind::Identifier, "k")
        );
        let rest: Vec<TokenKind> = scanner.by_ref().map(|token| token.unwrap().kind).collect();
        assert_eq!(
            rest,
            vec![TokenKind::Equal, TokenKind::Identifier, TokenKind::EndOfInput]
        );
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_positions_track_bytes() {
        let mut scanner = Scanner::new("é=1");
        scanner.next_token().unwrap();
        assert_eq!(scanner.position(), 2);
        scanner.next_token().unwrap();
        assert_eq!(scanner.position(), 3);
    }
}
