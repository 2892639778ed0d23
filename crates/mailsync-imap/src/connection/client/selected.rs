//! Commands available with a mailbox selected.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::authenticated::mailbox_status;
use super::states::{Authenticated, Selected};
use crate::command::{Command, FetchAttribute, SearchCriteria};
use crate::parser::{FetchedMessage, UntaggedResponse};
use crate::types::{SequenceSet, Uid};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Message count reported by SELECT.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.state.status.exists
    }

    /// Status reported by SELECT.
    #[must_use]
    pub const fn status(&self) -> &crate::types::MailboxStatus {
        self.state.status()
    }

    /// Selects another mailbox on the same connection.
    pub async fn select(self, mailbox: &str) -> Result<Self> {
        self.try_select(mailbox).await.map_err(|(_, e)| e)
    }

    /// Selects another mailbox. A refused SELECT leaves no mailbox selected,
    /// so the client comes back authenticated alongside the error.
    #[allow(clippy::result_large_err)]
    pub async fn try_select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<Self, (Client<S, Authenticated>, Error)> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        match self.execute(&command).await {
            Ok(data) => {
                self.state = Selected {
                    mailbox: mailbox.to_string(),
                    status: mailbox_status(data),
                };
                Ok(self)
            }
            Err(e) => Err((self.transition(Authenticated), e)),
        }
    }

    /// Returns every UID in the mailbox via `FETCH 1:* (UID)`.
    ///
    /// Cheaper than a full envelope fetch; an empty mailbox yields an empty
    /// vector without touching the network.
    pub async fn fetch_all_uids(&mut self) -> Result<Vec<Uid>> {
        if self.exists() == 0 {
            return Ok(Vec::new());
        }

        let messages = self
            .fetch(&SequenceSet::all(), vec![FetchAttribute::Uid], false)
            .await?;
        let mut uids: Vec<Uid> = messages.iter().filter_map(FetchedMessage::uid).collect();
        uids.sort_unstable();
        uids.dedup();
        Ok(uids)
    }

    /// Runs `UID SEARCH`, returning the matching UIDs in server order.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let data = self
            .execute(&Command::Search {
                criteria,
                uid: true,
            })
            .await?;

        Ok(data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Search(nums) => Some(nums),
                _ => None,
            })
            .flatten()
            .filter_map(Uid::new)
            .collect())
    }

    /// Runs `UID FETCH` for `uids`.
    pub async fn uid_fetch(
        &mut self,
        uids: &SequenceSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<FetchedMessage>> {
        self.fetch(uids, items, true).await
    }

    async fn fetch(
        &mut self,
        sequence: &SequenceSet,
        items: Vec<FetchAttribute>,
        uid: bool,
    ) -> Result<Vec<FetchedMessage>> {
        let data = self
            .execute(&Command::Fetch {
                sequence: sequence.clone(),
                items,
                uid,
            })
            .await?;

        let messages: Vec<FetchedMessage> = data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Fetch { seq, items } => Some(FetchedMessage { seq, items }),
                _ => None,
            })
            .collect();
        debug!(mailbox = self.mailbox(), count = messages.len(), "fetch complete");
        Ok(messages)
    }
}
