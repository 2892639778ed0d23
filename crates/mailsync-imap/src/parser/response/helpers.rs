//! Parsers shared by several response kinds.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ListResponse, MailboxAttribute, ResponseCode, SeqNum, Uid};
use crate::Result;

/// Parses `[CODE args]`, leaving the lexer after the closing bracket.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let name = lexer.read_atom()?.to_ascii_uppercase();

    let code = match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            Uid::new(n)
                .map(ResponseCode::UidNext)
                .ok_or_else(|| lexer.error("UIDNEXT 0"))?
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(lexer.read_number()?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            SeqNum::new(n)
                .map(ResponseCode::Unseen)
                .ok_or_else(|| lexer.error("UNSEEN 0"))?
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        _ => ResponseCode::Other(name),
    };

    // Arguments of codes we don't decode are dropped.
    lexer.take_until(b']');
    lexer.expect(Token::RBracket)?;
    Ok(code)
}

/// Parses space-separated capability names up to the end of the line or a
/// closing bracket.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut caps = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(s.to_ascii_uppercase()),
            Token::Crlf | Token::Eof => break,
            token => return Err(lexer.error(&format!("unexpected {token:?} in capabilities"))),
        }
    }
    Ok(caps)
}

/// Parses a parenthesized list of atoms such as `(\Seen \Draft)`.
pub fn parse_atom_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;
    let mut atoms = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(atoms),
            Token::Space => {}
            Token::Atom(s) => atoms.push(s.to_string()),
            // `\*` in PERMANENTFLAGS lexes as an atom followed by `*`.
            Token::Asterisk => {
                if let Some(last) = atoms.last_mut() {
                    last.push('*');
                }
            }
            token => return Err(lexer.error(&format!("unexpected {token:?} in list"))),
        }
    }
}

/// Parses the body of `* LIST (attrs) delim name`.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    let attributes = parse_atom_list(lexer)?
        .iter()
        .map(|a| MailboxAttribute::parse(a))
        .collect();
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("expected delimiter, got {token:?}"))),
    };
    lexer.expect_space()?;

    let name = lexer.read_astring()?;
    Ok(ListResponse {
        attributes,
        delimiter,
        name,
    })
}

/// Parses the numbers of `* SEARCH n n n`.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Number(n) => nums.push(n),
            // Trailing space before CRLF.
            Token::Crlf | Token::Eof => break,
            token => return Err(lexer.error(&format!("unexpected {token:?} in SEARCH"))),
        }
    }
    Ok(nums)
}
