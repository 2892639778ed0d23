//! Tokenizer for IMAP server responses.
//!
//! Works over one complete response, literals included, as produced by
//! [`crate::connection::FramedStream::read_response`].

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over a response buffer.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer positioned at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Looks at the next byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes the next byte if it equals `byte`.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes bytes up to (not including) CRLF or the end of input and
    /// returns them as text.
    pub fn rest_of_line(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Consumes bytes until `stop` (exclusive) and returns them as text.
    pub fn take_until(&mut self, stop: u8) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != stop) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' => {
                if self.input.get(self.pos + 1) == Some(&b'\n') {
                    self.pos += 2;
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("CR without LF"))
                }
            }
            // Some servers end lines with a bare LF.
            b'\n' => {
                self.pos += 1;
                Ok(Token::Crlf)
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            _ if is_atom_char(byte) => self.atom(),
            _ => Err(self.error(&format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted string")),
            }
        }

        // Servers do send raw 8-bit header text here.
        Ok(Token::QuotedString(String::from_utf8_lossy(&out).into_owned()))
    }

    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        // Non-synchronizing literal marker.
        self.eat(b'+');

        if !self.eat(b'}') {
            return Err(self.error("malformed literal prefix"));
        }
        if !self.eat(b'\r') || !self.eat(b'\n') {
            return Err(self.error("literal prefix not followed by CRLF"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal shorter than announced"))?;

        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }

        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("atom is not valid UTF-8"))?;

        if text.bytes().all(|b| b.is_ascii_digit()) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("number out of range"));
        }
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(text))
    }

    /// Builds a parse error at the current position.
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a single space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an atom, number, quoted string or literal as text.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            token => Err(self.error(&format!("expected astring, got {token:?}"))),
        }
    }

    /// Reads `NIL` or a string.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s)),
            Token::Literal(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            token => Err(self.error(&format!("expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("expected atom, got {token:?}"))),
        }
    }
}

/// Returns true for bytes allowed inside an atom.
///
/// `\` is accepted so flags and attributes such as `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    match b {
        b'(' | b')' | b'{' | b' ' | b'%' | b'*' | b'"' | b']' | b'[' => false,
        0x21..=0x7E => true,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_tagged_line() {
        assert_eq!(
            tokens(b"A0001 OK done\r\n"),
            vec![
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_numbers_and_nil() {
        assert_eq!(
            tokens(b"12 nil"),
            vec![Token::Number(12), Token::Space, Token::Nil]
        );
    }

    #[test]
    fn test_brackets_split_atoms() {
        assert_eq!(
            tokens(b"BODY[]"),
            vec![Token::Atom("BODY"), Token::LBracket, Token::RBracket]
        );
    }

    #[test]
    fn test_flag_atom() {
        assert_eq!(
            tokens(b"(\\Seen)"),
            vec![Token::LParen, Token::Atom("\\Seen"), Token::RParen]
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        assert_eq!(
            tokens(b"\"say \\\"hi\\\"\""),
            vec![Token::QuotedString("say \"hi\"".to_string())]
        );
    }

    #[test]
    fn test_quoted_string_with_8bit() {
        let mut lexer = Lexer::new(b"\"caf\xe9\"");
        assert!(matches!(lexer.next_token().unwrap(), Token::QuotedString(_)));
    }

    #[test]
    fn test_literal() {
        assert_eq!(
            tokens(b"{5}\r\nhello)"),
            vec![Token::Literal(b"hello".to_vec()), Token::RParen]
        );
        assert_eq!(
            tokens(b"{2+}\r\nhi"),
            vec![Token::Literal(b"hi".to_vec())]
        );
    }

    #[test]
    fn test_short_literal_is_error() {
        let mut lexer = Lexer::new(b"{10}\r\nabc");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_continuation_prefix() {
        assert_eq!(
            tokens(b"+ \r\n"),
            vec![Token::Plus, Token::Space, Token::Crlf]
        );
    }

    proptest! {
        #[test]
        fn lexer_never_panics(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            let mut lexer = Lexer::new(&data);
            for _ in 0..256 {
                match lexer.next_token() {
                    Ok(Token::Eof) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
}
