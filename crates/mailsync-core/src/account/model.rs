//! Account model types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored `OAuth2` token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Bearer token presented to the IMAP server.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: String,
    /// Expiry in unix seconds; negative when the provider gave none.
    pub expiry: i64,
}

impl OAuthCredential {
    /// True when the expiry is unknown or already past.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry < 0 || self.expiry < Utc::now().timestamp()
    }
}

/// How an account logs in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Credential {
    /// App-specific password used with LOGIN.
    Password(String),
    /// Token pair used with AUTHENTICATE XOAUTH2.
    OAuth(OAuthCredential),
    /// Every credential column is empty.
    #[default]
    LoggedOut,
}

impl Credential {
    /// Rebuilds a credential from the nullable account columns.
    ///
    /// An access token wins over a password; neither means logged out.
    #[must_use]
    pub fn from_columns(
        access_token: Option<String>,
        refresh_token: Option<String>,
        expiry: Option<i64>,
        password: Option<String>,
    ) -> Self {
        match (access_token.filter(|t| !t.is_empty()), password) {
            (Some(access_token), _) => Self::OAuth(OAuthCredential {
                access_token,
                refresh_token: refresh_token.unwrap_or_default(),
                expiry: expiry.unwrap_or(-1),
            }),
            (None, Some(password)) if !password.is_empty() => Self::Password(password),
            _ => Self::LoggedOut,
        }
    }
}

/// A mail account and its login state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Surrogate key.
    pub id: AccountId,
    /// Email address, also the IMAP user name.
    pub email: String,
    /// IMAP server as `host:port`.
    pub imap_url: String,
    /// Login material.
    pub credential: Credential,
}

impl Account {
    /// True unless every credential has been cleared.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        !matches!(self.credential, Credential::LoggedOut)
    }

    /// True when the account has no usable `OAuth2` expiry.
    ///
    /// Non-OAuth accounts count as expired.
    #[must_use]
    pub fn is_oauth_expired(&self) -> bool {
        match &self.credential {
            Credential::OAuth(token) => token.is_expired(),
            _ => true,
        }
    }

    /// True when an access token is present and not expired.
    #[must_use]
    pub fn is_oauth_valid(&self) -> bool {
        match &self.credential {
            Credential::OAuth(token) => !token.access_token.is_empty() && !token.is_expired(),
            _ => false,
        }
    }

    /// Splits `imap_url` into host and port, using `default_port` when no
    /// port is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty host or an invalid port.
    pub fn endpoint(&self, default_port: u16) -> Result<(String, u16)> {
        parse_endpoint(&self.imap_url, default_port)
    }
}

/// Parses `host[:port]`.
///
/// # Errors
///
/// Returns [`Error::Config`] for an empty host or an invalid port.
pub fn parse_endpoint(imap_url: &str, default_port: u16) -> Result<(String, u16)> {
    let url = imap_url.trim();
    let (host, port) = match url.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port in IMAP address {url}")))?;
            (host, port)
        }
        None => (url, default_port),
    };

    if host.is_empty() {
        return Err(Error::Config(format!("missing host in IMAP address {url:?}")));
    }
    Ok((host.to_string(), port))
}

/// Well-known IMAP server for an email address, as `host:port`.
///
/// Returns `None` for domains without a preset.
#[must_use]
pub fn provider_imap_url(email: &str, port: u16) -> Option<String> {
    let domain = email.rsplit_once('@')?.1.to_lowercase();

    let host = match domain.as_str() {
        "gmail.com" | "googlemail.com" => "imap.gmail.com",
        "outlook.com" | "hotmail.com" | "live.com" => "outlook.office365.com",
        "yahoo.com" | "ymail.com" => "imap.mail.yahoo.com",
        "icloud.com" | "me.com" | "mac.com" => "imap.mail.me.com",
        "aol.com" => "imap.aol.com",
        _ => return None,
    };
    Some(format!("{host}:{port}"))
}
