//! Scoped IMAP sessions.
//!
//! [`with_session`] dials, authenticates, hands the live connection to a
//! closure and logs out afterwards whatever the closure returned. A panic
//! in the closure drops the connection, which closes the socket.

use std::future::Future;
use std::pin::Pin;

use mailsync_imap::connection::{connect_plain, connect_tls};
use mailsync_imap::{Authenticated, Client, ImapStream, ListResponse, Selected};
use tracing::{debug, warn};

use crate::account::{Account, AuthMaterial};
use crate::{Error, Result};

/// Future returned by a session body.
pub type SessionFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// Where and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connect with implicit TLS. Plain TCP is only meant for loopback
    /// test servers.
    pub tls: bool,
    /// Login material.
    pub auth: AuthMaterial,
}

impl SessionTarget {
    /// Target for an account's server over TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the account's IMAP address is invalid.
    pub fn for_account(account: &Account, default_port: u16, auth: AuthMaterial) -> Result<Self> {
        let (host, port) = account.endpoint(default_port)?;
        Ok(Self {
            host,
            port,
            tls: true,
            auth,
        })
    }
}

enum State {
    Authenticated(Client<ImapStream, Authenticated>),
    Selected(Client<ImapStream, Selected>),
    Closed,
}

/// A logged-in connection, usable only inside [`with_session`].
pub struct Session {
    state: State,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Authenticated(_) => "authenticated",
            State::Selected(client) => client.mailbox(),
            State::Closed => "closed",
        };
        f.debug_struct("Session").field("state", &state).finish()
    }
}

impl Session {
    /// Runs `LIST reference pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the session lost its
    /// connection.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        match &mut self.state {
            State::Authenticated(client) => Ok(client.list(reference, pattern).await?),
            State::Selected(_) | State::Closed => Err(Error::Protocol(
                "LIST issued outside the authenticated state".to_string(),
            )),
        }
    }

    /// Selects `mailbox`, reusing the connection when another mailbox is
    /// already selected.
    ///
    /// # Errors
    ///
    /// Returns an error if SELECT fails. The session stays logged in with
    /// no mailbox selected, so it is still logged out cleanly.
    pub async fn select(&mut self, mailbox: &str) -> Result<&mut Client<ImapStream, Selected>> {
        let attempt = match std::mem::replace(&mut self.state, State::Closed) {
            State::Authenticated(client) => client.try_select(mailbox).await,
            State::Selected(client) => client.try_select(mailbox).await,
            State::Closed => return Err(Error::Transport("session is closed".to_string())),
        };
        match attempt {
            Ok(selected) => self.state = State::Selected(selected),
            Err((client, e)) => {
                self.state = State::Authenticated(client);
                return Err(e.into());
            }
        }

        match &mut self.state {
            State::Selected(client) => Ok(client),
            State::Authenticated(_) | State::Closed => {
                Err(Error::Protocol("mailbox selection lost".to_string()))
            }
        }
    }

    async fn logout(self) {
        let result = match self.state {
            State::Authenticated(client) => client.logout().await,
            State::Selected(client) => client.logout().await,
            State::Closed => return,
        };
        if let Err(e) = result {
            debug!(error = %e, "logout failed");
        }
    }
}

/// Opens a session to `target`, runs `body` and always logs out.
///
/// Dial and TLS failures surface as [`Error::Transport`], rejected
/// credentials as [`Error::Authentication`]; `body` does not run then.
///
/// ```ignore
/// let names = with_session(&target, |session| {
///     Box::pin(async move {
///         let list = session.list("", "*").await?;
///         Ok(list.into_iter().map(|m| m.name).collect::<Vec<_>>())
///     })
/// })
/// .await?;
/// ```
///
/// # Errors
///
/// Returns the connection, login or body error.
pub async fn with_session<T, F>(target: &SessionTarget, body: F) -> Result<T>
where
    F: for<'s> FnOnce(&'s mut Session) -> SessionFuture<'s, T> + Send,
    T: Send,
{
    let stream = if target.tls {
        connect_tls(&target.host, target.port).await?
    } else {
        connect_plain(&target.host, target.port).await?
    };

    let client = Client::from_stream(stream).await?;
    let client = match &target.auth {
        AuthMaterial::Login { user, password } => client.login(user, password).await?,
        AuthMaterial::XOAuth2 { user, access_token } => {
            client.authenticate_xoauth2(user, access_token).await?
        }
    };
    debug!(host = %target.host, user = target.auth.user(), "session open");

    let mut session = Session {
        state: State::Authenticated(client),
    };
    let result = body(&mut session).await;
    if let Err(e) = &result {
        warn!(host = %target.host, error = %e, "session body failed");
    }
    session.logout().await;
    result
}
