//! # mailsync-imap
//!
//! The IMAP subset a mail cache needs: LOGIN, AUTHENTICATE XOAUTH2, LIST,
//! SELECT, UID SEARCH, FETCH / UID FETCH and LOGOUT, over implicit TLS.
//!
//! ```ignore
//! use mailsync_imap::{Client, FetchAttribute, SequenceSet, connection::connect_tls};
//!
//! let stream = connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let mut client = client.login("user@example.com", "app-password").await?;
//!
//! let mailboxes = client.list("", "*").await?;
//! let mut inbox = client.select("INBOX").await?;
//! let uids = inbox.fetch_all_uids().await?;
//! if let Some(set) = SequenceSet::from_uids(&uids) {
//!     let messages = inbox
//!         .uid_fetch(&set, vec![FetchAttribute::Uid, FetchAttribute::Envelope])
//!         .await?;
//! }
//! inbox.logout().await?;
//! ```
//!
//! Connection states are tracked in the type system:
//!
//! ```text
//! NotAuthenticated ── login / authenticate_xoauth2 ──> Authenticated ── select ──> Selected
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, TagGenerator};
pub use connection::{Authenticated, Client, FramedStream, ImapStream, NotAuthenticated, Selected};
pub use error::{Error, Result};
pub use parser::{
    Address, BodyStructure, Envelope, FetchItem, FetchedMessage, Response, ResponseParser,
    UntaggedResponse,
};
pub use types::{
    ListResponse, MailboxAttribute, MailboxStatus, ResponseCode, SeqNum, SequenceSet, Status, Tag,
    Uid,
};

/// Port for IMAP over implicit TLS.
pub const DEFAULT_PORT: u16 = 993;
