//! IMAP commands issued by the sync engine.

mod serialize;
mod tag_generator;

use crate::types::SequenceSet;

pub use tag_generator::TagGenerator;

use serialize::{write_astring, write_fetch_items, write_list_pattern, write_search_criteria};

/// Data item requested by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`.
    Uid,
    /// `ENVELOPE`.
    Envelope,
    /// `BODYSTRUCTURE`.
    BodyStructure,
    /// `BODY.PEEK[section]`; `None` is the whole message.
    BodyPeek(Option<String>),
}

/// SEARCH criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message.
    All,
    /// Messages without the `\Deleted` flag.
    NotDeleted,
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE with an optional initial response (already base64).
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Initial response.
        initial_response: Option<String>,
    },
    /// LIST.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// SELECT.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// SEARCH or UID SEARCH.
    Search {
        /// Criteria.
        criteria: SearchCriteria,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// FETCH or UID FETCH.
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
    /// LOGOUT.
    Logout,
}

impl Command {
    /// Serializes the command with the given tag, CRLF included.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(response) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(response.as_bytes());
                }
            }
            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_list_pattern(&mut buf, pattern);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }
            Self::Search { criteria, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"SEARCH ");
                write_search_criteria(&mut buf, *criteria);
            }
            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}
