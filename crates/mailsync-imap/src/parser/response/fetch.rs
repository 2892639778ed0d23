//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::parse_atom_list;
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses the parenthesized item list of `* n FETCH (...)`.
///
/// Items the client never requests are skipped as whole values.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => return Err(lexer.error(&format!("unexpected {token:?} in FETCH"))),
        };

        match name.as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH"))?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_atom_list(lexer)?));
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" | "BODY.PEEK" | "RFC822" => {
                if lexer.peek() == Some(b'[') {
                    items.push(parse_body_section(lexer)?);
                } else if name == "RFC822" {
                    lexer.expect_space()?;
                    let data = read_body_data(lexer)?;
                    items.push(FetchItem::Body {
                        section: String::new(),
                        data,
                    });
                } else {
                    lexer.expect_space()?;
                    items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
                }
            }
            _ => {
                // Unrequested section item such as `BINARY[1]`.
                if lexer.eat(b'[') {
                    lexer.take_until(b']');
                    lexer.expect(Token::RBracket)?;
                }
                lexer.expect_space()?;
                skip_value(lexer)?;
            }
        }
    }
}

fn parse_body_section(lexer: &mut Lexer<'_>) -> Result<FetchItem> {
    lexer.expect(Token::LBracket)?;
    let section = lexer.take_until(b']');
    lexer.expect(Token::RBracket)?;

    // Partial origin, e.g. `<0>`.
    if lexer.peek() == Some(b'<') {
        lexer.read_atom()?;
    }

    lexer.expect_space()?;
    let data = read_body_data(lexer)?;
    Ok(FetchItem::Body { section, data })
}

fn read_body_data(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Literal(data) => Ok(Some(data)),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        Token::Nil => Ok(None),
        token => Err(lexer.error(&format!("expected body data, got {token:?}"))),
    }
}

/// Parses an ENVELOPE structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.next_token()? {
                    Token::RParen => return Ok(addresses),
                    Token::Space => {}
                    Token::LParen => addresses.push(parse_address(lexer)?),
                    token => {
                        return Err(lexer.error(&format!("unexpected {token:?} in address list")));
                    }
                }
            }
        }
        token => Err(lexer.error(&format!("expected address list, got {token:?}"))),
    }
}

/// Parses the four fields of one address; the opening paren is consumed.
fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODYSTRUCTURE (or non-extensible BODY) value.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut parts = Vec::new();
        while lexer.peek() == Some(b'(') {
            parts.push(parse_body_structure(lexer)?);
            lexer.eat(b' ');
        }
        let subtype = lexer.read_astring()?.to_ascii_lowercase();
        skip_to_close(lexer)?;
        return Ok(BodyStructure::Multipart { subtype, parts });
    }

    let media_type = lexer.read_astring()?.to_ascii_lowercase();
    lexer.expect_space()?;
    let subtype = lexer.read_astring()?.to_ascii_lowercase();
    lexer.expect_space()?;
    skip_value(lexer)?; // parameters
    lexer.expect_space()?;
    lexer.read_nstring()?; // id
    lexer.expect_space()?;
    lexer.read_nstring()?; // description
    lexer.expect_space()?;
    let encoding = lexer.read_astring()?;
    lexer.expect_space()?;
    let size = lexer.read_number()?;
    skip_to_close(lexer)?;

    Ok(BodyStructure::Single {
        media_type,
        subtype,
        encoding,
        size,
    })
}

/// Skips one value: an atom, number, string, literal, NIL or a balanced
/// parenthesized list.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    match lexer.next_token()? {
        Token::LParen => skip_to_close(lexer),
        Token::Atom(_)
        | Token::Number(_)
        | Token::QuotedString(_)
        | Token::Literal(_)
        | Token::Nil => Ok(()),
        token => Err(lexer.error(&format!("expected value, got {token:?}"))),
    }
}

/// Consumes tokens through the `)` closing the current list.
fn skip_to_close(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth == 0 => return Ok(()),
            Token::RParen => depth -= 1,
            Token::Eof => return Err(lexer.error("unbalanced parentheses")),
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_and_flags() {
        let mut lexer = Lexer::new(b"(UID 42 FLAGS (\\Seen))");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items[0], FetchItem::Uid(Uid::new(42).unwrap()));
        assert_eq!(items[1], FetchItem::Flags(vec!["\\Seen".to_string()]));
    }

    #[test]
    fn test_uid_zero_rejected() {
        let mut lexer = Lexer::new(b"(UID 0)");
        assert!(parse_fetch_response(&mut lexer).is_err());
    }

    #[test]
    fn test_envelope() {
        let input = b"(ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Hello\" \
            ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) \
            ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL \
            ((NIL NIL \"imap\" \"cac.washington.edu\")(\"Bob\" NIL \"bob\" \"example.org\")) \
            NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\"))";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        let FetchItem::Envelope(env) = &items[0] else {
            panic!("expected envelope");
        };
        assert_eq!(env.subject.as_deref(), Some("Hello"));
        assert_eq!(env.from[0].name.as_deref(), Some("Terry Gray"));
        assert_eq!(env.from[0].email().as_deref(), Some("gray@cac.washington.edu"));
        assert!(env.reply_to.is_empty());
        assert_eq!(env.to.len(), 2);
        assert_eq!(env.to[1].email().as_deref(), Some("bob@example.org"));
        assert_eq!(
            env.message_id.as_deref(),
            Some("<B27397-0100000@cac.washington.edu>")
        );
    }

    #[test]
    fn test_body_literal() {
        let mut lexer = Lexer::new(b"(UID 9 BODY[] {11}\r\nHello world)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: String::new(),
                data: Some(b"Hello world".to_vec()),
            }
        );
    }

    #[test]
    fn test_body_nil() {
        let mut lexer = Lexer::new(b"(BODY[TEXT]<0> NIL)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: "TEXT".to_string(),
                data: None,
            }
        );
    }

    #[test]
    fn test_single_part_structure() {
        let mut lexer = Lexer::new(
            b"(BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 3028 92))",
        );
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[0],
            FetchItem::BodyStructure(BodyStructure::Single {
                media_type: "text".to_string(),
                subtype: "plain".to_string(),
                encoding: "7BIT".to_string(),
                size: 3028,
            })
        );
    }

    #[test]
    fn test_multipart_structure_with_extensions() {
        let mut lexer = Lexer::new(
            b"(BODYSTRUCTURE ((\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 10 1 NIL NIL NIL)\
              (\"text\" \"html\" (\"charset\" \"utf-8\") NIL NIL \"quoted-printable\" 20 1 NIL NIL NIL) \
              \"alternative\" (\"boundary\" \"xyz\") NIL NIL) UID 5)",
        );
        let items = parse_fetch_response(&mut lexer).unwrap();
        let FetchItem::BodyStructure(BodyStructure::Multipart { subtype, parts }) = &items[0] else {
            panic!("expected multipart");
        };
        assert_eq!(subtype, "alternative");
        assert_eq!(parts.len(), 2);
        assert_eq!(items[1], FetchItem::Uid(Uid::new(5).unwrap()));
    }

    #[test]
    fn test_unrequested_items_skipped() {
        let mut lexer = Lexer::new(
            b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" RFC822.SIZE 4286 MODSEQ (12) UID 3)",
        );
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(3).unwrap())]);
    }
}
