//! Greeting and authentication.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting from a freshly connected stream.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut stream = FramedStream::new(stream);
        let greeting = stream.read_response().await?;

        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => match code {
                Some(ResponseCode::Capability(caps)) => caps,
                _ => Vec::new(),
            },
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream,
            tags: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with LOGIN. A NO or BAD reply becomes [`Error::Auth`].
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => {}
            Err(Error::No(text) | Error::Bad(text)) => return Err(Error::Auth(text)),
            Err(e) => return Err(e),
        }
        debug!(user = username, "LOGIN accepted");
        Ok(self.transition(Authenticated))
    }

    /// Authenticates with SASL XOAUTH2, sending the initial response inline.
    ///
    /// A server rejecting the token first sends a continuation carrying an
    /// error payload; it is answered with an empty line so the server can
    /// finish with NO. A second challenge is a protocol error.
    pub async fn authenticate_xoauth2(
        mut self,
        user: &str,
        access_token: &str,
    ) -> Result<Client<S, Authenticated>> {
        let tag = self.tags.next();
        let command = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some(mailsync_oauth::sasl::xoauth2_response(user, access_token)),
        };
        self.stream.send(&command.serialize(&tag)).await?;

        let mut challenged = false;
        loop {
            let raw = self.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Continuation { text } => {
                    if challenged {
                        return Err(Error::Protocol("unexpected server challenge".to_string()));
                    }
                    challenged = true;
                    debug!(challenge = text.as_deref().unwrap_or(""), "XOAUTH2 error challenge");
                    self.stream.send(b"\r\n").await?;
                }
                Response::Tagged {
                    tag: done,
                    status,
                    text,
                    ..
                } if done.as_str() == tag => {
                    return match status {
                        Status::Ok | Status::PreAuth => {
                            debug!(user, "XOAUTH2 accepted");
                            Ok(self.transition(Authenticated))
                        }
                        Status::No | Status::Bad => Err(Error::Auth(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Response::Untagged(UntaggedResponse::Capability(caps)) => self.capabilities = caps,
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                _ => {}
            }
        }
    }
}
