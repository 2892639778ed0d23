//! Cached message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Envelope address as stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name.
    pub name: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl EmailAddress {
    /// Returns `mailbox@host` when both halves are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

impl From<&mailsync_imap::Address> for EmailAddress {
    fn from(addr: &mailsync_imap::Address) -> Self {
        Self {
            name: addr.name.clone(),
            mailbox: addr.mailbox.clone(),
            host: addr.host.clone(),
        }
    }
}

/// Message envelope, written once when the message is first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// `Date` header as sent by the server.
    pub date: Option<String>,
    /// `Subject`.
    pub subject: Option<String>,
    /// `From`.
    pub from: Vec<EmailAddress>,
    /// `Sender`.
    pub sender: Vec<EmailAddress>,
    /// `Reply-To`.
    pub reply_to: Vec<EmailAddress>,
    /// `To`.
    pub to: Vec<EmailAddress>,
    /// `Cc`.
    pub cc: Vec<EmailAddress>,
    /// `Bcc`.
    pub bcc: Vec<EmailAddress>,
    /// `In-Reply-To`.
    pub in_reply_to: Option<String>,
    /// `Message-ID`.
    pub message_id: Option<String>,
}

impl From<&mailsync_imap::Envelope> for Envelope {
    fn from(env: &mailsync_imap::Envelope) -> Self {
        let addresses = |list: &[mailsync_imap::Address]| list.iter().map(EmailAddress::from).collect();

        Self {
            date: env.date.clone(),
            subject: env.subject.clone(),
            from: addresses(&env.from),
            sender: addresses(&env.sender),
            reply_to: addresses(&env.reply_to),
            to: addresses(&env.to),
            cc: addresses(&env.cc),
            bcc: addresses(&env.bcc),
            in_reply_to: env.in_reply_to.clone(),
            message_id: env.message_id.clone(),
        }
    }
}

/// A message as seen on the server, before it is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    /// UID within the mailbox.
    pub uid: u32,
    /// Parsed envelope.
    pub envelope: Envelope,
}

/// One row of a mailbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Owning account.
    pub account_id: AccountId,
    /// Mailbox name.
    pub mailbox: String,
    /// UID within the mailbox.
    pub uid: u32,
    /// Envelope.
    pub envelope: Envelope,
    /// When the row was first cached.
    pub received_at: DateTime<Utc>,
}

/// Decoded bodies cached for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedBody {
    /// Decoded `text/plain` body, empty when absent.
    pub plain: String,
    /// Decoded `text/html` body, empty when absent.
    pub html: String,
}

impl CachedBody {
    /// True until the body has been fetched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.html.is_empty()
    }

    /// HTML when present, otherwise plain text.
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        [&self.html, &self.plain]
            .into_iter()
            .find(|body| !body.is_empty())
            .map(String::as_str)
    }
}

impl From<mailsync_mime::EmailBody> for CachedBody {
    fn from(body: mailsync_mime::EmailBody) -> Self {
        Self {
            plain: body.plain,
            html: body.html,
        }
    }
}
