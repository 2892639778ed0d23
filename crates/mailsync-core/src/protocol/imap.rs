//! [`MailProtocol`] over IMAP, one scoped session per call.

use std::collections::HashSet;

use async_trait::async_trait;
use mailsync_imap::{FetchAttribute, FetchedMessage, SearchCriteria, SequenceSet, Uid};
use tracing::{debug, warn};

use super::{MailProtocol, new_uids, page_window};
use crate::session::{SessionTarget, with_session};
use crate::store::{Envelope, RemoteMessage};
use crate::{Error, Result};

/// The IMAP implementation of [`MailProtocol`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapProtocol;

impl ImapProtocol {
    /// Creates the protocol.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Converts a FETCH result, logging and dropping messages that lack a UID
/// or an envelope.
fn remote_message(message: &FetchedMessage, mailbox: &str) -> Option<RemoteMessage> {
    let Some(uid) = message.uid() else {
        warn!(mailbox, seq = message.seq.get(), "FETCH response without UID, skipping");
        return None;
    };
    let Some(envelope) = message.envelope() else {
        warn!(mailbox, uid = uid.get(), "FETCH response without ENVELOPE, skipping");
        return None;
    };
    Some(RemoteMessage {
        uid: uid.get(),
        envelope: Envelope::from(envelope),
    })
}

fn uid_set(uids: &[u32]) -> Option<SequenceSet> {
    let uids: Vec<Uid> = uids.iter().copied().filter_map(Uid::new).collect();
    SequenceSet::from_uids(&uids)
}

#[async_trait]
impl MailProtocol for ImapProtocol {
    async fn verify(&self, target: &SessionTarget) -> Result<()> {
        with_session(target, |_| Box::pin(async { Ok(()) })).await
    }

    async fn list_mailboxes(&self, target: &SessionTarget) -> Result<Vec<String>> {
        with_session(target, |session| {
            Box::pin(async move {
                let list = session.list("", "*").await?;
                Ok(list.into_iter().map(|mailbox| mailbox.name).collect())
            })
        })
        .await
    }

    async fn fetch_new_messages(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        known: &HashSet<u32>,
    ) -> Result<Vec<RemoteMessage>> {
        let mailbox = mailbox.to_string();
        let known = known.clone();

        with_session(target, move |session| {
            Box::pin(async move {
                let selected = session.select(&mailbox).await?;
                if selected.exists() == 0 {
                    debug!(mailbox = %mailbox, "mailbox is empty");
                    return Ok(Vec::new());
                }

                let remote: Vec<u32> = selected
                    .fetch_all_uids()
                    .await?
                    .into_iter()
                    .map(Uid::get)
                    .collect();
                let fresh = new_uids(&remote, &known);
                let Some(set) = uid_set(&fresh) else {
                    debug!(mailbox = %mailbox, remote = remote.len(), "no new messages");
                    return Ok(Vec::new());
                };

                debug!(mailbox = %mailbox, new = fresh.len(), "fetching new envelopes");
                let fetched = selected
                    .uid_fetch(
                        &set,
                        vec![
                            FetchAttribute::Uid,
                            FetchAttribute::Envelope,
                            FetchAttribute::BodyStructure,
                        ],
                    )
                    .await?;

                Ok(fetched
                    .iter()
                    .filter_map(|message| remote_message(message, &mailbox))
                    .collect())
            })
        })
        .await
    }

    async fn fetch_raw_message(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        uid: u32,
    ) -> Result<Vec<u8>> {
        let mailbox = mailbox.to_string();

        with_session(target, move |session| {
            Box::pin(async move {
                let selected = session.select(&mailbox).await?;
                let fetched = selected
                    .uid_fetch(
                        &SequenceSet::Single(uid),
                        vec![FetchAttribute::BodyPeek(None)],
                    )
                    .await?;

                fetched
                    .iter()
                    .find(|message| message.uid().map(Uid::get) == Some(uid))
                    .or_else(|| fetched.first())
                    .and_then(|message| message.body(""))
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| {
                        Error::Protocol(format!("no body section for UID {uid} in {mailbox}"))
                    })
            })
        })
        .await
    }

    async fn browse(
        &self,
        target: &SessionTarget,
        mailbox: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>> {
        let mailbox = mailbox.to_string();

        with_session(target, move |session| {
            Box::pin(async move {
                let selected = session.select(&mailbox).await?;
                let all: Vec<u32> = selected
                    .uid_search(SearchCriteria::NotDeleted)
                    .await?
                    .into_iter()
                    .map(Uid::get)
                    .collect();

                let window = page_window(&all, start, limit);
                let Some(set) = uid_set(&window) else {
                    return Ok(Vec::new());
                };

                let fetched = selected
                    .uid_fetch(&set, vec![FetchAttribute::Uid, FetchAttribute::Envelope])
                    .await?;
                let mut page: Vec<RemoteMessage> = fetched
                    .iter()
                    .filter_map(|message| remote_message(message, &mailbox))
                    .collect();
                page.sort_unstable_by(|a, b| b.uid.cmp(&a.uid));
                Ok(page)
            })
        })
        .await
    }
}
