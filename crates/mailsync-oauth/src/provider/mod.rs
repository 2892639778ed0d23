//! `OAuth2` provider endpoints.

use crate::error::{Error, Result};
use url::Url;

/// Authorize and token endpoints of an `OAuth2` provider.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Microsoft").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Scopes requested when the caller does not name any.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a custom provider from explicit endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL is invalid.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Microsoft/Outlook provider, the built-in one.
    ///
    /// Scopes:
    /// - `https://outlook.office.com/IMAP.AccessAsUser.All` - IMAP access
    /// - `offline_access` - Refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Ok(Self::new(
            "Microsoft",
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            "https://login.microsoftonline.com/common/oauth2/v2.0/token",
        )?
        .with_default_scopes(vec![
            "https://outlook.office.com/IMAP.AccessAsUser.All".to_string(),
            "offline_access".to_string(),
        ]))
    }

    /// Validates the endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error unless both endpoints are `https` (or `http` on a
    /// loopback host, for local test servers).
    pub fn validate(&self) -> Result<()> {
        for (label, url) in [("auth_url", &self.auth_url), ("token_url", &self.token_url)] {
            let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
            match url.scheme() {
                "https" => {}
                "http" if loopback => {}
                scheme => {
                    return Err(Error::InvalidConfig(format!(
                        "{label} must use https, got {scheme}"
                    )));
                }
            }
        }
        Ok(())
    }
}
