//! Cereal text parser
//!
//! Hand-rolled scanner over the character stream. Every document is a `:`
//! sentinel followed by exactly one value; whitespace is insignificant
//! between tokens. Any grammar violation raises immediately with a
//! character position; there is no silent recovery and no partial tree.
//!
//! Bare strings are the subtle production: `[A-Za-z0-9 _-]+`, consumed
//! greedily up to the next structural delimiter, excluding the four
//! keywords and anything that reads as a number or bigint. That is what
//! lets `{ name: John Doe }` carry a two-word unquoted value.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::DateTime;
use std::collections::HashSet;
use url::Url;

use crate::error::ParseError;
use crate::raw::{EntryKey, Raw};

/// Parse one complete cereal document into a raw value tree.
pub fn parse_document(input: &str) -> Result<Raw, ParseError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if !parser.eat(':') {
        return Err(ParseError::MissingSentinel);
    }
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(ParseError::TrailingCharacters(parser.pos));
    }
    Ok(value)
}

/// Classify a scalar token the way the grammar does: keyword, bigint,
/// number, or bare string. Returns `None` for tokens that fit no form.
/// The serializer reuses this to decide whether a string round-trips bare.
pub(crate) fn scalar_raw(token: &str) -> Option<Raw> {
    match token {
        "" => return None,
        "true" => return Some(Raw::Bool(true)),
        "false" => return Some(Raw::Bool(false)),
        "null" => return Some(Raw::Null),
        "undefined" => return Some(Raw::Undefined),
        _ => {}
    }

    // BigInt: optional sign, digits, trailing `n`
    if let Some(body) = token.strip_suffix('n') {
        let digits = body.strip_prefix(['+', '-']).unwrap_or(body);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return body.parse::<i128>().ok().map(Raw::BigInt);
        }
    }

    // Number: decimal/real literal, no trailing `n`
    let numberish = token.bytes().any(|b| b.is_ascii_digit())
        && token
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E'));
    if numberish {
        let integral = token
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'+' || b == b'-');
        if integral {
            if let Ok(i) = token.parse::<i64>() {
                return Some(Raw::Int(i));
            }
        }
        if let Ok(f) = token.parse::<f64>() {
            return Some(Raw::Float(f));
        }
        // Tokens like `1-2` fall through: not numbers, but bare-safe
    }

    if token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
    {
        return Some(Raw::Str(token.to_string()));
    }
    None
}

fn is_bare_char(c: char) -> bool {
    // Superset of the bare-string charset: `.` and `+` are scanned so that
    // numbers embedded in the stream tokenize greedily, then classification
    // rejects them from bare strings.
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '+')
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Raw, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_seq().map(Raw::Seq),
            Some('"') => self.parse_quoted().map(Raw::Str),
            Some('$') => self.parse_tagged(),
            Some('D') if self.peek_at(1) == Some('"') => self.parse_date(),
            Some('U') if self.peek_at(1) == Some('"') => self.parse_url(),
            Some('B') if self.peek_at(1) == Some('"') => self.parse_bytes(),
            Some('M') if self.peek_at(1) == Some('[') => self.parse_map(),
            Some('S') if self.peek_at(1) == Some('[') => self.parse_set(),
            Some(_) => self.parse_scalar(),
        }
    }

    /// Object form, assigning implicit integer keys as it goes:
    /// `{a, 5:b, c}` yields keys 1, 5, 6.
    fn parse_object(&mut self) -> Result<Raw, ParseError> {
        let start = self.pos;
        self.bump(); // {
        let mut entries: Vec<(EntryKey, Raw)> = Vec::new();
        let mut seen: HashSet<EntryKey> = HashSet::new();
        let mut next_implicit: u32 = 1;

        self.skip_ws();
        if self.eat('}') {
            return Ok(Raw::Entries(entries));
        }

        loop {
            self.skip_ws();
            let entry_pos = self.pos;
            let candidate = self.parse_value()?;
            self.skip_ws();

            let (key, value) = if self.eat(':') {
                let key = match candidate {
                    Raw::Str(name) => EntryKey::Name(name),
                    // Keys outside the field-tag range are rejected, not
                    // truncated
                    Raw::Int(tag) if (0..=i64::from(u32::MAX)).contains(&tag) => {
                        EntryKey::Tag(tag as u32)
                    }
                    _ => return Err(ParseError::BadKey(entry_pos)),
                };
                let value = self.parse_value()?;
                (key, value)
            } else {
                // A string or integer here could only have been a key; if it
                // is directly followed by a value, the colon is what's missing.
                if matches!(candidate, Raw::Str(_) | Raw::Int(_))
                    && !matches!(self.peek(), Some(',' | '}') | None)
                {
                    return Err(ParseError::MissingColon(self.pos));
                }
                let key = EntryKey::Tag(next_implicit);
                (key, candidate)
            };

            if let EntryKey::Tag(tag) = key {
                // Saturates at the top tag; an implicit key following it
                // then collides and errors
                next_implicit = tag.saturating_add(1);
            }
            if !seen.insert(key.clone()) {
                return Err(ParseError::DuplicateKey(entry_pos, key.to_string()));
            }
            entries.push((key, value));

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Raw::Entries(entries));
                }
                None => return Err(ParseError::UnterminatedObject(start)),
                Some(_) => return Err(ParseError::MissingComma(self.pos)),
            }
        }
    }

    fn parse_seq(&mut self) -> Result<Vec<Raw>, ParseError> {
        let start = self.pos;
        self.bump(); // [
        let mut items = Vec::new();

        self.skip_ws();
        if self.eat(']') {
            return Ok(items);
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    return Ok(items);
                }
                None => return Err(ParseError::UnterminatedArray(start)),
                Some(_) => return Err(ParseError::MissingComma(self.pos)),
            }
        }
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump(); // "
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString(start)),
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escape_pos = self.pos;
                    match self.bump() {
                        None => return Err(ParseError::UnterminatedString(start)),
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some('/') => out.push('/'),
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('0') => out.push('\0'),
                        Some('b') => out.push('\u{0008}'),
                        Some('f') => out.push('\u{000C}'),
                        Some('u') => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let digit = self
                                    .bump()
                                    .and_then(|c| c.to_digit(16))
                                    .ok_or(ParseError::InvalidEscape(escape_pos, 'u'))?;
                                code = code * 16 + digit;
                            }
                            let c = char::from_u32(code)
                                .ok_or(ParseError::InvalidEscape(escape_pos, 'u'))?;
                            out.push(c);
                        }
                        Some(other) => {
                            return Err(ParseError::InvalidEscape(escape_pos, other))
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_tagged(&mut self) -> Result<Raw, ParseError> {
        let tag_pos = self.pos;
        self.bump(); // $
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                tag.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if tag.is_empty() {
            return Err(ParseError::EmptyTag(tag_pos));
        }
        self.skip_ws();
        let body = match self.peek() {
            Some('{') => self.parse_object()?,
            Some('[') => Raw::Seq(self.parse_seq()?),
            Some('"') => Raw::Str(self.parse_quoted()?),
            _ => return Err(ParseError::IncompleteTag(tag_pos, tag)),
        };
        Ok(Raw::Tagged {
            tag,
            body: Box::new(body),
        })
    }

    fn parse_date(&mut self) -> Result<Raw, ParseError> {
        let lit_pos = self.pos;
        self.bump(); // D
        let body = self.parse_quoted()?;
        DateTime::parse_from_rfc3339(&body)
            .map(|d| Raw::Date(d.with_timezone(&chrono::Utc)))
            .map_err(|_| ParseError::InvalidDate(lit_pos, body))
    }

    fn parse_url(&mut self) -> Result<Raw, ParseError> {
        let lit_pos = self.pos;
        self.bump(); // U
        let body = self.parse_quoted()?;
        Url::parse(&body)
            .map(Raw::Url)
            .map_err(|_| ParseError::InvalidUrl(lit_pos, body))
    }

    fn parse_bytes(&mut self) -> Result<Raw, ParseError> {
        let lit_pos = self.pos;
        self.bump(); // B
        let body = self.parse_quoted()?;
        BASE64
            .decode(body.as_bytes())
            .map(Raw::Bytes)
            .map_err(|_| ParseError::InvalidBase64(lit_pos))
    }

    fn parse_map(&mut self) -> Result<Raw, ParseError> {
        let lit_pos = self.pos;
        self.bump(); // M
        let items = self.parse_seq()?;
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Raw::Seq(pair) => match <[Raw; 2]>::try_from(pair) {
                    Ok([key, value]) => pairs.push((key, value)),
                    Err(_) => return Err(ParseError::MalformedMapEntry(lit_pos)),
                },
                _ => return Err(ParseError::MalformedMapEntry(lit_pos)),
            }
        }
        Ok(Raw::MapLit(pairs))
    }

    fn parse_set(&mut self) -> Result<Raw, ParseError> {
        self.bump(); // S
        Ok(Raw::SetLit(self.parse_seq()?))
    }

    /// Numbers, bigints, keywords, and bare strings, scanned greedily to
    /// the next structural delimiter.
    fn parse_scalar(&mut self) -> Result<Raw, ParseError> {
        let start = self.pos;
        let mut run = String::new();
        while let Some(c) = self.peek() {
            if is_bare_char(c) {
                run.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if run.is_empty() {
            // Guarded by parse_value: a char is present and starts nothing
            return Err(ParseError::UnexpectedChar(start, self.peek().unwrap_or(' ')));
        }
        let token = run.trim_end();
        scalar_raw(token).ok_or_else(|| ParseError::InvalidLiteral(start, token.to_string()))
    }
}
