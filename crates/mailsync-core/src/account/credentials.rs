//! Login material for IMAP sessions, with transparent `OAuth2` refresh.

use mailsync_oauth::{OAuthClient, Token};
use tracing::{debug, info, warn};

use super::model::{Account, Credential, OAuthCredential};
use crate::store::CacheStore;
use crate::{Error, Result};

/// What a session presents to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMaterial {
    /// `LOGIN user password`.
    Login {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// `AUTHENTICATE XOAUTH2`.
    XOAuth2 {
        /// User name.
        user: String,
        /// Bearer token.
        access_token: String,
    },
}

impl AuthMaterial {
    /// The user name presented to the server.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Login { user, .. } | Self::XOAuth2 { user, .. } => user,
        }
    }
}

impl std::fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { user, .. } => f.debug_struct("Login").field("user", user).finish_non_exhaustive(),
            Self::XOAuth2 { user, .. } => f.debug_struct("XOAuth2").field("user", user).finish_non_exhaustive(),
        }
    }
}

/// Turns stored credentials into [`AuthMaterial`], refreshing expired
/// tokens and writing them back before use.
#[derive(Debug, Clone)]
pub struct CredentialProvider {
    store: CacheStore,
    oauth: Option<OAuthClient>,
}

impl CredentialProvider {
    /// Creates a provider. Without an `OAuth2` client, expired tokens
    /// cannot be refreshed.
    #[must_use]
    pub const fn new(store: CacheStore, oauth: Option<OAuthClient>) -> Self {
        Self { store, oauth }
    }

    /// Material for logging `account` in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] for a logged-out account or a
    /// refused refresh, [`Error::Transport`] if the token endpoint is
    /// unreachable.
    pub async fn authenticate(&self, account: &Account) -> Result<AuthMaterial> {
        match &account.credential {
            Credential::Password(password) => Ok(AuthMaterial::Login {
                user: account.email.clone(),
                password: password.clone(),
            }),
            Credential::OAuth(_) => {
                let token = self.refresh_if_needed(account).await?;
                Ok(AuthMaterial::XOAuth2 {
                    user: account.email.clone(),
                    access_token: token.access_token,
                })
            }
            Credential::LoggedOut => Err(Error::Authentication(format!(
                "account {} is logged out",
                account.id
            ))),
        }
    }

    /// Returns a usable token, exchanging the refresh token first when the
    /// stored one is expired or about to expire.
    ///
    /// The new token is persisted before it is returned. When the server
    /// omits a new refresh token the old one is kept. On failure the stored
    /// token is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the account has no token or the
    /// refresh is refused.
    pub async fn refresh_if_needed(&self, account: &Account) -> Result<OAuthCredential> {
        let Credential::OAuth(stored) = &account.credential else {
            return Err(Error::Authentication(format!(
                "account {} has no OAuth token",
                account.id
            )));
        };

        let token = Token::from_stored(&stored.access_token, &stored.refresh_token, stored.expiry);
        if stored.expiry >= 0 && !token.is_expired() {
            return Ok(stored.clone());
        }

        let Some(client) = &self.oauth else {
            warn!(account = %account.id, "token expired and no OAuth client is configured");
            return Err(Error::Authentication(
                "token expired and OAuth is not configured".to_string(),
            ));
        };

        debug!(account = %account.id, "refreshing access token");
        let refreshed = client.refresh_token(&token).await.map_err(|e| {
            warn!(account = %account.id, error = %e, "token refresh failed");
            Error::from(e)
        })?;

        let fresh = OAuthCredential {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed
                .refresh_token
                .clone()
                .unwrap_or_else(|| stored.refresh_token.clone()),
            expiry: refreshed.expiry_unix(),
        };
        self.store.update_oauth(account.id, &fresh).await?;
        info!(account = %account.id, "access token refreshed");
        Ok(fresh)
    }
}
