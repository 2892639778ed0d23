//! Response data types.

use crate::types::{ListResponse, ResponseCode, SeqNum, Uid};

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`.
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* NO`.
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BAD`.
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* PREAUTH`.
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BYE`.
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* CAPABILITY`, uppercased.
    Capability(Vec<String>),
    /// `* LIST`.
    List(ListResponse),
    /// `* FLAGS`.
    Flags(Vec<String>),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* n EXPUNGE`.
    Expunge(SeqNum),
    /// `* SEARCH`.
    Search(Vec<u32>),
    /// `* n FETCH (...)`.
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Data items.
        items: Vec<FetchItem>,
    },
}

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID`.
    Uid(Uid),
    /// `FLAGS`.
    Flags(Vec<String>),
    /// `ENVELOPE`.
    Envelope(Box<Envelope>),
    /// `BODYSTRUCTURE` or `BODY` without a section.
    BodyStructure(BodyStructure),
    /// `BODY[section]`; `data` is `None` when the server sent NIL.
    Body {
        /// Section specifier, empty for the whole message.
        section: String,
        /// Section contents.
        data: Option<Vec<u8>>,
    },
}

/// Message envelope, header values as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// `Date`.
    pub date: Option<String>,
    /// `Subject`.
    pub subject: Option<String>,
    /// `From`.
    pub from: Vec<Address>,
    /// `Sender`.
    pub sender: Vec<Address>,
    /// `Reply-To`.
    pub reply_to: Vec<Address>,
    /// `To`.
    pub to: Vec<Address>,
    /// `Cc`.
    pub cc: Vec<Address>,
    /// `Bcc`.
    pub bcc: Vec<Address>,
    /// `In-Reply-To`.
    pub in_reply_to: Option<String>,
    /// `Message-ID`.
    pub message_id: Option<String>,
}

/// Envelope address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route, obsolete.
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// Returns `mailbox@host` when both halves are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// Shape of a message as reported by BODYSTRUCTURE.
///
/// Only the fields needed to locate text parts are kept; extension data is
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Non-multipart body.
    Single {
        /// Lowercased media type, e.g. `text`.
        media_type: String,
        /// Lowercased subtype, e.g. `plain`.
        subtype: String,
        /// Content-Transfer-Encoding as sent.
        encoding: String,
        /// Size in bytes.
        size: u32,
    },
    /// `multipart/*`.
    Multipart {
        /// Lowercased subtype, e.g. `alternative`.
        subtype: String,
        /// Child parts in order.
        parts: Vec<Self>,
    },
}

impl BodyStructure {
    /// Number of leaf parts.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Multipart { parts, .. } => parts.iter().map(Self::leaf_count).sum(),
        }
    }
}

/// Items returned for one message by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Sequence number at the time of the response.
    pub seq: SeqNum,
    /// Data items in server order.
    pub items: Vec<FetchItem>,
}

impl FetchedMessage {
    /// The `UID` item, if present.
    #[must_use]
    pub fn uid(&self) -> Option<Uid> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Uid(uid) => Some(*uid),
            _ => None,
        })
    }

    /// The `ENVELOPE` item, if present.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Envelope(env) => Some(env.as_ref()),
            _ => None,
        })
    }

    /// The `BODYSTRUCTURE` item, if present.
    #[must_use]
    pub fn body_structure(&self) -> Option<&BodyStructure> {
        self.items.iter().find_map(|item| match item {
            FetchItem::BodyStructure(bs) => Some(bs),
            _ => None,
        })
    }

    /// Data of `BODY[section]`. `None` when the section is missing or NIL.
    #[must_use]
    pub fn body(&self, section: &str) -> Option<&[u8]> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Body { section: s, data } if s.eq_ignore_ascii_case(section) => {
                data.as_deref()
            }
            _ => None,
        })
    }
}
