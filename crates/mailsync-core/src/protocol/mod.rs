//! Remote operations the syncers depend on.
//!
//! [`MailProtocol`] is the seam between the sync logic and the wire. The
//! IMAP implementation opens one scoped session per call; tests substitute
//! an in-memory server.

mod imap;
#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::Result;
use crate::session::SessionTarget;
use crate::store::RemoteMessage;

pub use imap::ImapProtocol;

/// Stateless remote mail operations.
#[async_trait]
pub trait MailProtocol: Send + Sync {
    /// Logs in and out again, proving the credentials work.
    async fn verify(&self, target: &SessionTarget) -> Result<()>;

    /// Names of every mailbox (`LIST "" *`).
    async fn list_mailboxes(&self, target: &SessionTarget) -> Result<Vec<String>>;

    /// Envelopes of the messages in `mailbox` whose UIDs are not in
    /// `known`. An empty mailbox or no new UIDs means no envelope fetch.
    async fn fetch_new_messages(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        known: &HashSet<u32>,
    ) -> Result<Vec<RemoteMessage>>;

    /// The full raw message (`BODY.PEEK[]`).
    async fn fetch_raw_message(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        uid: u32,
    ) -> Result<Vec<u8>>;

    /// One page of undeleted messages, newest first, without touching the
    /// cache.
    async fn browse(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>>;
}

/// Remote UIDs not yet cached, ascending.
#[must_use]
pub fn new_uids(remote: &[u32], known: &HashSet<u32>) -> Vec<u32> {
    let mut fresh: Vec<u32> = remote.iter().copied().filter(|uid| !known.contains(uid)).collect();
    fresh.sort_unstable();
    fresh.dedup();
    fresh
}

/// The `[start, start + limit)` window of `uids` ordered newest first.
#[must_use]
pub fn page_window(uids: &[u32], start: u32, limit: u32) -> Vec<u32> {
    let mut ordered = uids.to_vec();
    ordered.sort_unstable_by(|a, b| b.cmp(a));
    ordered.dedup();
    ordered
        .into_iter()
        .skip(start as usize)
        .take(limit as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_new_uids() {
        let known = HashSet::from([1, 2]);
        assert_eq!(new_uids(&[1, 2, 3], &known), [3]);
        assert!(new_uids(&[2, 1], &known).is_empty());
        assert_eq!(new_uids(&[9, 4, 4], &HashSet::new()), [4, 9]);
    }

    #[test]
    fn test_page_window() {
        let uids = [3, 10, 7, 1];
        assert_eq!(page_window(&uids, 0, 2), [10, 7]);
        assert_eq!(page_window(&uids, 2, 10), [3, 1]);
        assert!(page_window(&uids, 4, 10).is_empty());
        assert!(page_window(&uids, 0, 0).is_empty());
    }

    proptest! {
        #[test]
        fn new_uids_is_set_difference(
            remote in proptest::collection::vec(1u32..500, 0..64),
            known in proptest::collection::hash_set(1u32..500, 0..64),
        ) {
            let fresh = new_uids(&remote, &known);
            let expected: HashSet<u32> = remote.iter().copied().filter(|u| !known.contains(u)).collect();

            prop_assert_eq!(fresh.iter().copied().collect::<HashSet<_>>(), expected);
            prop_assert!(fresh.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn page_window_is_bounded_and_descending(
            uids in proptest::collection::vec(1u32..1000, 0..64),
            start in 0u32..80,
            limit in 0u32..20,
        ) {
            let page = page_window(&uids, start, limit);
            prop_assert!(page.len() <= limit as usize);
            prop_assert!(page.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
