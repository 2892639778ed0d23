//! Error types for the sync engine.
//!
//! Failures from the protocol crates are folded into four kinds the engine
//! acts on: transport problems are retried on the next tick, authentication
//! problems sign the account out, protocol problems skip the item at hand
//! and decode problems are never fatal.

use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Dial, TLS or I/O failure talking to a server.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials were rejected, missing or could not be refreshed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The server said something we could not use.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Content could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the account should be treated as signed out.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// True for failures worth retrying later.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<mailsync_imap::Error> for Error {
    fn from(err: mailsync_imap::Error) -> Self {
        use mailsync_imap::Error as Imap;

        match err {
            Imap::Auth(text) => Self::Authentication(text),
            Imap::Bye(text) => Self::Transport(format!("server closed the connection: {text}")),
            err if err.is_transport() => Self::Transport(err.to_string()),
            err => Self::Protocol(err.to_string()),
        }
    }
}

impl From<mailsync_oauth::Error> for Error {
    fn from(err: mailsync_oauth::Error) -> Self {
        use mailsync_oauth::Error as OAuth;

        match err {
            OAuth::Http(e) => Self::Transport(e.to_string()),
            OAuth::InvalidConfig(text) => Self::Config(text),
            OAuth::Url(e) => Self::Config(e.to_string()),
            err => Self::Authentication(err.to_string()),
        }
    }
}

impl From<mailsync_mime::Error> for Error {
    fn from(err: mailsync_mime::Error) -> Self {
        use mailsync_mime::Error as Mime;

        match err {
            Mime::MissingBoundary | Mime::InvalidMultipart(_) => Self::Protocol(err.to_string()),
            Mime::InvalidContentType(_) | Mime::Base64Decode(_) => Self::Decode(err.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
