//! `OAuth2` authorization code flow and token refresh.

mod code;
mod handoff;
mod pkce;

pub use code::{AuthorizationCodeFlow, PendingAuthorization};
pub use handoff::{AuthorizationCallback, CodeReceiver, CodeSender, code_handoff};
pub use pkce::{CHALLENGE_METHOD, PkceChallenge};

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// `OAuth2` client registration plus an HTTP client for the token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Redirect URI registered for the authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider endpoints.
    pub provider: Provider,
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Exchanges the token's refresh token for a new access token.
    ///
    /// When the server omits a new refresh token the old one is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has no refresh token, the request
    /// fails, or the server rejects the grant.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);

        let mut new_token = self.request_token(params).await?;
        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        debug!(provider = %self.provider.name, "refreshed access token");
        Ok(new_token)
    }

    /// Exchanges an authorization code and its PKCE verifier for tokens.
    pub(crate) async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("code_verifier", code_verifier);
        if let Some(uri) = &self.redirect_uri {
            params.insert("redirect_uri", uri);
        }

        let token = self.request_token(params).await?;
        debug!(provider = %self.provider.name, "exchanged authorization code");
        Ok(token)
    }

    async fn request_token(&self, mut params: HashMap<&str, &str>) -> Result<Token> {
        params.insert("client_id", &self.client_id);
        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(Token::from_response(token_response))
    }
}
