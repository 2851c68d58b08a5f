//! Content stream tokenizer.
//!
//! Splits one decoded content stream into primitive tokens: numbers,
//! strings, names, booleans, structural brackets and bare keywords.
//! Operand assembly (arrays, dictionaries, inline images) happens one level
//! up in [`super::tokenizer`].

use crate::error::{PdfError, Result};
use bytes::Bytes;

/// A primitive token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer value
    Int(i64),
    /// Floating point value
    Real(f64),
    /// Boolean value
    Bool(bool),
    /// The `null` keyword
    Null,
    /// Literal name (e.g., /Name), `#xx` escapes decoded; invalid UTF-8 is
    /// replaced lossily
    Literal(String),
    /// String (literal or hex)
    String(Vec<u8>),
    /// Bare keyword; in a content stream this is an instruction name
    Keyword(String),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
}

/// Byte-level lexer over a single content stream.
pub struct ContentLexer {
    data: Bytes,
    pos: usize,
}

impl ContentLexer {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.data.len());
    }

    fn advance_one(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Next token with its starting offset; `None` at end of input.
    pub fn next_token(&mut self) -> Option<Result<(usize, Token)>> {
        self.skip_whitespace();
        if self.at_end() {
            return None;
        }

        let token_pos = self.pos;
        let b = self.peek()?;

        let result = match b {
            b'/' => self.parse_literal(),
            b'(' => self.parse_string(),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.advance(2);
                    Ok(Token::DictStart)
                } else {
                    self.parse_hex_string()
                }
            }
            b'>' => {
                if self.peek_at(1) == Some(b'>') {
                    self.advance(2);
                    Ok(Token::DictEnd)
                } else {
                    self.advance(1);
                    Err(PdfError::TokenError {
                        pos: token_pos,
                        msg: "stray '>'".into(),
                    })
                }
            }
            b'[' => {
                self.advance(1);
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.advance(1);
                Ok(Token::ArrayEnd)
            }
            b'{' => {
                self.advance(1);
                Ok(Token::BraceOpen)
            }
            b'}' => {
                self.advance(1);
                Ok(Token::BraceClose)
            }
            b')' => {
                self.advance(1);
                Err(PdfError::TokenError {
                    pos: token_pos,
                    msg: "unbalanced ')'".into(),
                })
            }
            b'+' | b'-' => {
                if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == b'.') {
                    self.parse_number(token_pos)
                } else {
                    Ok(self.parse_keyword())
                }
            }
            b'.' => {
                if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
                    self.parse_number(token_pos)
                } else {
                    Ok(self.parse_keyword())
                }
            }
            c if c.is_ascii_digit() => self.parse_number(token_pos),
            _ => Ok(self.parse_keyword()),
        };

        Some(result.map(|token| (token_pos, token)))
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                self.skip_comment();
            } else if is_whitespace(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(b) = self.advance_one() {
            if b == b'\n' || b == b'\r' {
                break;
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Token> {
        self.advance(1); // skip '/'
        let mut name = Vec::with_capacity(16);

        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' {
                let c1 = self.peek_at(1);
                let c2 = self.peek_at(2);
                if let (Some(h1), Some(h2)) = (c1.and_then(hex_value), c2.and_then(hex_value)) {
                    self.advance(3);
                    name.push((h1 << 4) | h2);
                    continue;
                }
                self.advance(1);
                continue;
            }
            name.push(b);
            self.advance(1);
        }

        let name = match String::from_utf8(name) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
        };
        Ok(Token::Literal(name))
    }

    fn parse_number(&mut self, start_pos: usize) -> Result<Token> {
        let mut negative = false;
        if self.peek() == Some(b'-') {
            negative = true;
            self.advance(1);
        } else if self.peek() == Some(b'+') {
            self.advance(1);
        }

        let mut int_part: i64 = 0;
        let mut has_int = false;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                has_int = true;
                int_part = int_part.saturating_mul(10).saturating_add((b - b'0') as i64);
                self.advance(1);
            } else {
                break;
            }
        }

        let mut has_dot = false;
        let mut frac_part: i64 = 0;
        let mut frac_digits: u32 = 0;
        if self.peek() == Some(b'.') {
            has_dot = true;
            self.advance(1);
            while let Some(b) = self.peek() {
                if b.is_ascii_digit() {
                    // Digits past i64 precision are dropped.
                    if frac_digits < 18 {
                        frac_part = frac_part * 10 + (b - b'0') as i64;
                        frac_digits += 1;
                    }
                    self.advance(1);
                } else {
                    break;
                }
            }
        }

        if !has_int && frac_digits == 0 {
            return Err(PdfError::TokenError {
                pos: start_pos,
                msg: "invalid number".into(),
            });
        }

        if has_dot {
            let mut value = int_part as f64;
            if frac_digits > 0 {
                value += (frac_part as f64) / 10f64.powi(frac_digits as i32);
            }
            if negative {
                value = -value;
            }
            Ok(Token::Real(value))
        } else {
            let value = if negative { -int_part } else { int_part };
            Ok(Token::Int(value))
        }
    }

    fn parse_string(&mut self) -> Result<Token> {
        self.advance(1); // skip '('
        let mut result = Vec::with_capacity(32);
        let mut depth = 1;

        while depth > 0 {
            match self.advance_one() {
                Some(b'(') => {
                    depth += 1;
                    result.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    if depth > 0 {
                        result.push(b')');
                    }
                }
                Some(b'\\') => match self.advance_one() {
                    Some(b'n') => result.push(b'\n'),
                    Some(b'r') => result.push(b'\r'),
                    Some(b't') => result.push(b'\t'),
                    Some(b'b') => result.push(0x08),
                    Some(b'f') => result.push(0x0c),
                    Some(b'(') => result.push(b'('),
                    Some(b')') => result.push(b')'),
                    Some(b'\\') => result.push(b'\\'),
                    Some(b'\r') => {
                        if self.peek() == Some(b'\n') {
                            self.advance(1);
                        }
                    }
                    Some(b'\n') => {}
                    Some(c) if (b'0'..b'8').contains(&c) => {
                        let mut octal = (c - b'0') as u32;
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d) if (b'0'..b'8').contains(&d) => {
                                    self.advance(1);
                                    octal = octal * 8 + (d - b'0') as u32;
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    }
                    Some(c) => result.push(c),
                    None => return Err(PdfError::UnexpectedEof),
                },
                Some(c) => result.push(c),
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        Ok(Token::String(result))
    }

    fn parse_hex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.advance(1); // skip '<'
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            match self.peek() {
                Some(b'>') => {
                    self.advance(1);
                    break;
                }
                Some(c) if c.is_ascii_hexdigit() => {
                    self.advance(1);
                    let nibble = hex_value(c).unwrap_or(0);
                    if let Some(high) = pending {
                        result.push((high << 4) | nibble);
                        pending = None;
                    } else {
                        pending = Some(nibble);
                    }
                }
                Some(c) if is_whitespace(c) => self.advance(1),
                Some(_) => {
                    return Err(PdfError::TokenError {
                        pos: start,
                        msg: "invalid hex string".into(),
                    });
                }
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        // An odd trailing digit is padded with zero.
        if let Some(nibble) = pending {
            result.push(nibble << 4);
        }

        Ok(Token::String(result))
    }

    fn parse_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_keyword_end(b) {
                break;
            }
            self.advance(1);
        }
        // A lone delimiter byte still makes progress.
        if self.pos == start {
            self.advance(1);
        }
        match &self.data[start..self.pos] {
            b"true" => Token::Bool(true),
            b"false" => Token::Bool(false),
            b"null" => Token::Null,
            // Instruction names are ASCII; anything else becomes an unknown
            // operator with U+FFFD in its name.
            bytes => Token::Keyword(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Read raw inline image data up to the `target` marker (followed by
    /// whitespace or end of input). The marker is consumed.
    pub fn read_inline_data(&mut self, target: &[u8]) -> Vec<u8> {
        // A single whitespace byte separates ID from the data.
        if matches!(self.peek(), Some(b) if is_whitespace(b)) {
            self.advance(1);
        }

        let mut data = Vec::new();
        while !self.at_end() {
            if self.data[self.pos..].starts_with(target) {
                let after = self.peek_at(target.len());
                let before_ok = data.last().is_none_or(|&b| is_whitespace(b)) || target != b"EI";
                if before_ok && after.is_none_or(is_keyword_end) {
                    self.advance(target.len());
                    if data.last().is_some_and(|&b| is_whitespace(b)) {
                        data.pop();
                    }
                    return data;
                }
            }
            if let Some(b) = self.advance_one() {
                data.push(b);
            }
        }

        if data.last().is_some_and(|&b| is_whitespace(b)) {
            data.pop();
        }
        data
    }
}

/// Check if byte is PDF whitespace.
pub(crate) const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn is_keyword_end(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
