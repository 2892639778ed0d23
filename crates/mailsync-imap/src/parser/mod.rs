//! Sans-I/O parser for IMAP server responses.
//!
//! The lexer turns a framed response into tokens; the response parser builds
//! [`Response`] values from them.
//!
//! ```
//! use mailsync_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 4 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(4)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyStructure, Envelope, FetchItem, FetchedMessage, Response, ResponseParser,
    UntaggedResponse,
};
