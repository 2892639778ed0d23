//! How long each kind of cached data may be served without asking the
//! server.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Kinds of data the cache holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntity {
    /// The mailbox list of an account.
    Mailboxes,
    /// Message envelopes of one mailbox.
    Envelopes,
    /// Decoded message bodies.
    Bodies,
}

/// Freshness rule for one [`CacheEntity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyPolicy {
    /// Served from cache while the newest write is younger than the TTL.
    Ttl(Duration),
    /// Reconciled against the server on every sync; only the difference is
    /// fetched.
    DiffRefresh,
    /// Fetched once and never refreshed.
    Permanent,
}

/// Default mailbox list TTL.
pub const MAILBOX_TTL: Duration = Duration::from_secs(5 * 60);

impl CacheEntity {
    /// Policy used unless configuration overrides it.
    #[must_use]
    pub const fn default_policy(self) -> ConsistencyPolicy {
        match self {
            Self::Mailboxes => ConsistencyPolicy::Ttl(MAILBOX_TTL),
            Self::Envelopes => ConsistencyPolicy::DiffRefresh,
            Self::Bodies => ConsistencyPolicy::Permanent,
        }
    }
}

impl ConsistencyPolicy {
    /// Whether data last written at `last_updated` may be served as is.
    #[must_use]
    pub fn is_fresh(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, last_updated) {
            (_, None) | (Self::DiffRefresh, _) => false,
            (Self::Permanent, Some(_)) => true,
            (Self::Ttl(ttl), Some(at)) => {
                let age = now.signed_duration_since(at);
                chrono::Duration::from_std(*ttl).is_ok_and(|ttl| age < ttl)
            }
        }
    }
}
