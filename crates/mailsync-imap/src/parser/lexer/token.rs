//! Lexer tokens.

/// One lexical unit of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare atom, borrowed from the input.
    Atom(&'a str),
    /// Decoded quoted string.
    QuotedString(String),
    /// Literal payload (`{n}\r\n` followed by n bytes).
    Literal(Vec<u8>),
    /// All-digit atom.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`, any case.
    Nil,
    /// Line end.
    Crlf,
    /// Input exhausted.
    Eof,
}
