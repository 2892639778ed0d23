//! Core IMAP types.

mod identifiers;
mod mailbox;
mod sequence;

pub use identifiers::{SeqNum, Tag, Uid};
pub use mailbox::{ListResponse, MailboxAttribute, MailboxStatus};
pub use sequence::SequenceSet;

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success.
    Ok,
    /// Operational failure.
    No,
    /// Protocol-level error.
    Bad,
    /// Already authenticated at greeting.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

/// Bracketed response code, e.g. `[UIDNEXT 42]`.
///
/// Only the codes the client acts on are decoded; the rest keep their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// Alert text for the user.
    Alert,
    /// `READ-ONLY`.
    ReadOnly,
    /// `READ-WRITE`.
    ReadWrite,
    /// `UIDNEXT n`.
    UidNext(Uid),
    /// `UIDVALIDITY n`.
    UidValidity(u32),
    /// `UNSEEN n`.
    Unseen(SeqNum),
    /// `CAPABILITY ...`, uppercased.
    Capability(Vec<String>),
    /// `AUTHENTICATIONFAILED` (RFC 5530).
    AuthenticationFailed,
    /// Anything else.
    Other(String),
}
