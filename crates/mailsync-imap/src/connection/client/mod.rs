//! Type-state IMAP client.
//!
//! A connection moves through `NotAuthenticated`, `Authenticated` and
//! `Selected`; each state exposes only the commands valid in it, and
//! transitions consume the client.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Status;
use crate::{Error, Result};

/// IMAP connection in state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tags: TagGenerator,
    pub(crate) capabilities: Vec<String>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Capabilities announced by the server, uppercased.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks for a capability, ignoring case.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Sends LOGOUT and closes the connection.
    ///
    /// The server's BYE and a connection dropped before the tagged reply are
    /// both treated as a completed logout.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        self.stream.send(&Command::Logout.serialize(&tag)).await?;
        match self.collect(&tag).await {
            Ok(_) | Err(Error::Bye(_)) => {}
            Err(e) if e.is_transport() => debug!(error = %e, "connection closed during logout"),
            Err(e) => return Err(e),
        }
        self.stream.shutdown().await.ok();
        Ok(())
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends `command` and returns the untagged data that preceded its
    /// successful completion.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<UntaggedResponse>> {
        let tag = self.tags.next();
        self.stream.send(&command.serialize(&tag)).await?;
        self.collect(&tag).await
    }

    /// Reads until the completion for `tag`, mapping NO and BAD to errors.
    pub(crate) async fn collect(&mut self, tag: &str) -> Result<Vec<UntaggedResponse>> {
        let mut data = Vec::new();

        loop {
            let raw = self.stream.read_response().await?;
            let response = match ResponseParser::parse(&raw) {
                Ok(response) => response,
                Err(e) => {
                    // One bad line must not abort the whole command.
                    let line = String::from_utf8_lossy(&raw);
                    warn!(error = %e, line = %line.trim_end(), "skipping unparsable response");
                    continue;
                }
            };

            match response {
                Response::Tagged {
                    tag: done,
                    status,
                    text,
                    ..
                } if done.as_str() == tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(data),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Tagged { tag: other, .. } => {
                    warn!(tag = %other, "completion for unknown tag");
                }
                Response::Untagged(UntaggedResponse::Capability(caps)) => {
                    self.capabilities = caps;
                }
                Response::Untagged(untagged) => data.push(untagged),
                Response::Continuation { .. } => {
                    return Err(Error::Protocol("unexpected continuation request".to_string()));
                }
            }
        }
    }
}
