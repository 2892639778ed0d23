//! Response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyStructure, Envelope, FetchItem, FetchedMessage, UntaggedResponse,
};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::Result;

use helpers::{
    parse_atom_list, parse_capability_data, parse_list_response, parse_response_code,
    parse_search_response,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// `+` continuation request.
    Continuation {
        /// Text or base64 challenge, if any.
        text: Option<String>,
    },
}

/// Parses complete responses as framed by [`crate::FramedStream`].
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                Self::untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                lexer.eat(b' ');
                let text = lexer.rest_of_line();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => {
                lexer.expect_space()?;
                let status = parse_status(lexer.read_atom()?)
                    .ok_or_else(|| lexer.error("invalid tagged status"))?;
                let (code, text) = resp_text(&mut lexer)?;
                Ok(Response::Tagged {
                    tag: Tag::new(tag),
                    status,
                    code,
                    text,
                })
            }
            token => Err(lexer.error(&format!("expected *, + or tag, got {token:?}"))),
        }
    }

    fn untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        match lexer.next_token()? {
            Token::Atom(keyword) => {
                let keyword = keyword.to_ascii_uppercase();
                if let Some(status) = parse_status(&keyword) {
                    let (code, text) = resp_text(lexer)?;
                    return Ok(match status {
                        Status::Ok => UntaggedResponse::Ok { code, text },
                        Status::No => UntaggedResponse::No { code, text },
                        Status::Bad => UntaggedResponse::Bad { code, text },
                        Status::PreAuth => UntaggedResponse::PreAuth { code, text },
                        Status::Bye => UntaggedResponse::Bye { code, text },
                    });
                }

                match keyword.as_str() {
                    "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_capability_data(lexer)?)),
                    "FLAGS" => {
                        lexer.expect_space()?;
                        Ok(UntaggedResponse::Flags(parse_atom_list(lexer)?))
                    }
                    "LIST" => {
                        lexer.expect_space()?;
                        Ok(UntaggedResponse::List(parse_list_response(lexer)?))
                    }
                    "SEARCH" => Ok(UntaggedResponse::Search(parse_search_response(lexer)?)),
                    _ => Err(lexer.error(&format!("unsupported untagged response {keyword}"))),
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom()?.to_ascii_uppercase();
                match keyword.as_str() {
                    "EXISTS" => Ok(UntaggedResponse::Exists(n)),
                    "RECENT" => Ok(UntaggedResponse::Recent(n)),
                    "EXPUNGE" => SeqNum::new(n)
                        .map(UntaggedResponse::Expunge)
                        .ok_or_else(|| lexer.error("EXPUNGE 0")),
                    "FETCH" => {
                        let seq = SeqNum::new(n).ok_or_else(|| lexer.error("FETCH 0"))?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        Ok(UntaggedResponse::Fetch { seq, items })
                    }
                    _ => Err(lexer.error(&format!("unsupported message data {keyword}"))),
                }
            }
            token => Err(lexer.error(&format!("unexpected {token:?} after *"))),
        }
    }
}

fn parse_status(word: &str) -> Option<Status> {
    match word.to_ascii_uppercase().as_str() {
        "OK" => Some(Status::Ok),
        "NO" => Some(Status::No),
        "BAD" => Some(Status::Bad),
        "PREAUTH" => Some(Status::PreAuth),
        "BYE" => Some(Status::Bye),
        _ => None,
    }
}

/// Parses `[code] text` following a status word. Both parts are optional.
fn resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    lexer.eat(b' ');
    let code = if lexer.peek() == Some(b'[') {
        let code = parse_response_code(lexer)?;
        lexer.eat(b' ');
        Some(code)
    } else {
        None
    };
    Ok((code, lexer.rest_of_line()))
}
