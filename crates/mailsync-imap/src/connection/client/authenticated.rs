//! Commands available once logged in.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::{Error, Result};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{ListResponse, MailboxStatus, ResponseCode};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let data = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::List(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// Selects `mailbox` read-write.
    pub async fn select(self, mailbox: &str) -> Result<Client<S, Selected>> {
        self.try_select(mailbox).await.map_err(|(_, e)| e)
    }

    /// Selects `mailbox`, handing the logged-in client back with the error
    /// when the server refuses it.
    #[allow(clippy::result_large_err)]
    pub async fn try_select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<Client<S, Selected>, (Self, Error)> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        match self.execute(&command).await {
            Ok(data) => {
                let status = mailbox_status(data);
                Ok(self.transition(Selected {
                    mailbox: mailbox.to_string(),
                    status,
                }))
            }
            Err(e) => Err((self, e)),
        }
    }
}

/// Folds SELECT's untagged data into a status snapshot.
pub(super) fn mailbox_status(data: Vec<UntaggedResponse>) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for untagged in data {
        match untagged {
            UntaggedResponse::Exists(n) => status.exists = n,
            UntaggedResponse::Recent(n) => status.recent = n,
            UntaggedResponse::Flags(flags) => status.flags = flags,
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidNext(uid) => status.uid_next = Some(uid),
                ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                ResponseCode::ReadOnly => status.read_only = true,
                _ => {}
            },
            _ => {}
        }
    }

    status
}
