//! Authorization Code Flow with PKCE.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use url::Url;

use super::handoff::{CodeReceiver, CodeSender, code_handoff};
use super::pkce::{CHALLENGE_METHOD, PkceChallenge};
use super::OAuthClient;
use crate::error::Result;
use crate::token::Token;

/// Builds authorize requests for one client.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeFlow {
    client: OAuthClient,
}

/// One in-flight login attempt: the URL to open, the PKCE verifier and the
/// receiving half of the code handoff.
#[derive(Debug)]
pub struct PendingAuthorization {
    url: Url,
    pkce: PkceChallenge,
    receiver: CodeReceiver,
}

impl AuthorizationCodeFlow {
    /// Creates a new authorization code flow.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Starts a login attempt with a fresh PKCE pair and `state`.
    ///
    /// The returned [`CodeSender`] goes to whatever captures the redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorize URL cannot be built.
    pub fn begin(&self, scopes: Option<&[String]>) -> Result<(PendingAuthorization, CodeSender)> {
        let pkce = PkceChallenge::generate();
        let state = random_state();
        let url = self.authorization_url(&pkce, &state, scopes)?;
        let (sender, receiver) = code_handoff(state);

        Ok((
            PendingAuthorization {
                url,
                pkce,
                receiver,
            },
            sender,
        ))
    }

    /// Builds the authorize URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider endpoints are not acceptable.
    pub fn authorization_url(
        &self,
        pkce: &PkceChallenge,
        state: &str,
        scopes: Option<&[String]>,
    ) -> Result<Url> {
        self.client.provider.validate()?;
        let mut url = self.client.provider.auth_url.clone();

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &self.client.client_id)
                .append_pair("response_type", "code");

            if let Some(redirect_uri) = &self.client.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }

            let scope_str = scopes.map_or_else(
                || self.client.provider.default_scopes.join(" "),
                |s| s.join(" "),
            );
            if !scope_str.is_empty() {
                pairs.append_pair("scope", &scope_str);
            }

            pairs
                .append_pair("state", state)
                .append_pair("code_challenge", pkce.challenge())
                .append_pair("code_challenge_method", CHALLENGE_METHOD)
                .append_pair("access_type", "offline");
        }

        Ok(url)
    }
}

impl PendingAuthorization {
    /// URL the user must open.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// `state` issued for this attempt.
    #[must_use]
    pub fn state(&self) -> &str {
        self.receiver.state()
    }

    /// Waits for the redirect, validates it and exchanges the code.
    ///
    /// # Errors
    ///
    /// Returns any handoff error (timeout, state mismatch, denial) or a
    /// token endpoint error.
    pub async fn complete(self, client: &OAuthClient, timeout: Duration) -> Result<Token> {
        let code = self.receiver.wait(timeout).await?;
        client.exchange_code(&code, self.pkce.verifier()).await
    }
}

fn random_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}
