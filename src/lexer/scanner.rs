//! Lexer for Opal source text.
//!
//! The scanner walks the source left-to-right. At each cursor position it
//! tries every lexical category against the remainder of the source and
//! records a candidate token for each match, so a single position may
//! carry several classifications at once. Whitespace following a lexeme
//! is folded into every candidate's extents, giving downstream code a
//! single cursor to advance.
//!
//! Scanning never fails. Bytes that match no category are skipped one at
//! a time, and malformed escape sequences are reported as non-fatal
//! diagnostics alongside the stream.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::LexError;
use crate::lexer::token::{Extents, Token, TokenKind, TokenStream};

const KEYWORDS: [&str; 7] = ["let", "if", "else", "map", "over", "unreachable", "return"];
const MODIFIERS: [&str; 2] = ["public", "internal"];
const BOOLEANS: [&str; 2] = ["true", "false"];

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^-?[0-9]+").unwrap();
    static ref DECIMAL: Regex = Regex::new(r"^-?(?:[0-9]+\.[0-9]*|\.[0-9]+)").unwrap();
    // Quoted form first: a backtick opens a verbatim identifier with no
    // escapes. The bare form is a maximal run excluding whitespace, the
    // five structural characters, and the Unicode bracket/quote classes.
    static ref IDENTIFIER: Regex =
        Regex::new(r"^(?:`[^`]+`|[^\s=.,:;\p{Ps}\p{Pe}\p{Pi}\p{Pf}]+)").unwrap();
    static ref CHARACTER: Regex = Regex::new(r"^'(?:\\.|[^'\\])'").unwrap();
    static ref STRING: Regex = Regex::new(r#"^"(?:\\.|[^"\\])*""#).unwrap();
    // One character that could continue a bare identifier, used for the
    // boundary checks the regex crate cannot express as lookahead.
    static ref IDENT_BODY: Regex = Regex::new(r"^[^\s=.,:;\p{Ps}\p{Pe}\p{Pi}\p{Pf}]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"^\s+").unwrap();
}

fn continues_identifier(rest: &str) -> bool {
    IDENT_BODY.is_match(rest)
}

fn trailing_whitespace(rest: &str) -> usize {
    WHITESPACE.find(rest).map(|m| m.end()).unwrap_or(0)
}

/// Decode the escape sequences of a character or string literal body.
///
/// Returns the decoded text together with the byte offset and character
/// of every unrecognised escape, which decodes to the escaped character
/// itself.
pub fn unescape(raw: &str) -> (String, Vec<(usize, char)>) {
    let mut out = String::with_capacity(raw.len());
    let mut issues = Vec::new();
    let mut chars = raw.char_indices();

    while let Some((at, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '"')) => out.push('"'),
            Some((_, '\'')) => out.push('\''),
            Some((_, 'b')) => out.push('\u{0008}'),
            Some((_, 'n')) => out.push('\n'),
            Some((_, 'r')) => out.push('\r'),
            Some((_, 't')) => out.push('\t'),
            Some((_, '\\')) => out.push('\\'),
            Some((_, other)) => {
                out.push(other);
                issues.push((at, other));
            }
            None => {}
        }
    }

    (out, issues)
}

/// The lexer that tokenises Opal source text.
pub struct Scanner<'a> {
    source: &'a str,
    cursor: usize,
    errors: Vec<LexError>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            errors: Vec::new(),
        }
    }

    /// Tokenise the entire source.
    pub fn scan_all(mut self) -> (TokenStream, Vec<LexError>) {
        let mut stream = TokenStream::new();

        while self.cursor < self.source.len() {
            let candidates = self.candidates();
            let Some(next) = candidates.iter().map(|t| t.extents.end).max() else {
                // Unrecognised byte: skip it silently.
                self.cursor += 1;
                continue;
            };
            for token in candidates {
                stream.insert(token);
            }
            self.cursor = next;
        }

        (stream, self.errors)
    }

    /// Every classification that matches at the current cursor, with
    /// trailing whitespace folded into each candidate's extents.
    fn candidates(&mut self) -> Vec<Token> {
        // `get` rather than indexing: a skipped byte can leave the cursor
        // inside a multi-byte character.
        let source = self.source;
        let Some(rest) = source.get(self.cursor..) else {
            return Vec::new();
        };
        if rest.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<(TokenKind, usize)> = Vec::new();

        if let Some(m) = INTEGER.find(rest) {
            if !continues_identifier(&rest[m.end()..]) {
                matches.push((TokenKind::Integer, m.end()));
            }
        }
        if let Some(m) = DECIMAL.find(rest) {
            if !continues_identifier(&rest[m.end()..]) {
                matches.push((TokenKind::Decimal, m.end()));
            }
        }
        if let Some(m) = IDENTIFIER.find(rest) {
            matches.push((TokenKind::Identifier, m.end()));
        }
        if let Some(m) = CHARACTER.find(rest) {
            self.check_escapes(&rest[1..m.end() - 1], self.cursor + 1);
            matches.push((TokenKind::Character, m.end()));
        }
        if let Some(m) = STRING.find(rest) {
            self.check_escapes(&rest[1..m.end() - 1], self.cursor + 1);
            matches.push((TokenKind::String, m.end()));
        }
        for word in BOOLEANS {
            if self.word_matches(rest, word) {
                matches.push((TokenKind::Boolean, word.len()));
            }
        }
        if self.word_matches(rest, "poison") {
            matches.push((TokenKind::Poison, "poison".len()));
        }
        if let Some(kind) = match rest.as_bytes()[0] {
            b';' => Some(TokenKind::Semicolon),
            b':' => Some(TokenKind::Colon),
            b'=' => Some(TokenKind::EqualSign),
            b'(' | b')' => Some(TokenKind::Parenthesis),
            b'{' | b'}' => Some(TokenKind::CurlyBracket),
            b',' => Some(TokenKind::Comma),
            b'.' => Some(TokenKind::Dot),
            _ => None,
        } {
            matches.push((kind, 1));
        }
        for word in KEYWORDS {
            if self.word_matches(rest, word) {
                matches.push((TokenKind::Keyword, word.len()));
            }
        }
        for word in MODIFIERS {
            if self.word_matches(rest, word) {
                matches.push((TokenKind::Modifier, word.len()));
            }
        }

        // A position that reads as a literal never also reads as an
        // identifier. Keyword and modifier readings stay; the parser
        // discriminates those by context.
        if matches.iter().any(|(kind, _)| kind.is_literal()) {
            matches.retain(|(kind, _)| *kind != TokenKind::Identifier);
        }

        matches
            .into_iter()
            .map(|(kind, len)| {
                let padded = len + trailing_whitespace(&rest[len..]);
                Token::new(
                    kind,
                    &rest[..len],
                    Extents::new(self.cursor, self.cursor + padded),
                )
            })
            .collect()
    }

    fn word_matches(&self, rest: &str, word: &str) -> bool {
        rest.starts_with(word) && !continues_identifier(&rest[word.len()..])
    }

    fn check_escapes(&mut self, body: &str, base: usize) {
        for (at, c) in unescape(body).1 {
            self.errors.push(LexError::new(
                format!("unknown escape sequence `\\{}`", c),
                Extents::new(base + at, base + at + 1 + c.len_utf8()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> TokenStream {
        let (stream, _) = Scanner::new(source).scan_all();
        stream
    }

    fn kinds_at(stream: &TokenStream, offset: usize) -> Vec<TokenKind> {
        let mut kinds: Vec<_> = stream
            .at(offset)
            .map(|set| set.iter().map(|t| t.kind).collect())
            .unwrap_or_default();
        kinds.sort_by_key(|k| format!("{:?}", k));
        kinds
    }

    #[test]
    fn test_keyword_is_also_identifier() {
        let stream = scan("let");
        assert_eq!(
            kinds_at(&stream, 0),
            vec![TokenKind::Identifier, TokenKind::Keyword]
        );
    }

    #[test]
    fn test_literal_suppresses_identifier() {
        let stream = scan("5");
        assert_eq!(kinds_at(&stream, 0), vec![TokenKind::Integer]);
    }

    #[test]
    fn test_modifier_keeps_identifier_reading() {
        let stream = scan("public");
        assert_eq!(
            kinds_at(&stream, 0),
            vec![TokenKind::Identifier, TokenKind::Modifier]
        );
    }

    #[test]
    fn test_trailing_whitespace_attaches() {
        let stream = scan("let   x");
        let set = stream.at(0).unwrap();
        assert!(set.iter().all(|t| t.extents.end == 6));
        assert!(set.iter().all(|t| t.lexeme == "let"));
    }

    #[test]
    fn test_unrecognised_bytes_are_skipped() {
        let stream = scan("[x]");
        assert_eq!(stream.offsets().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_unknown_escape_is_reported() {
        let (_, errors) = Scanner::new(r#""a\z""#).scan_all();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("\\z"));
    }

    #[test]
    fn test_unescape_table() {
        let (decoded, issues) = unescape(r"a\n\t\\\'\q");
        assert_eq!(decoded, "a\n\t\\'q");
        assert_eq!(issues, vec![(9, 'q')]);
    }
}
