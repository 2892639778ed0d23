//! # mailsync-oauth
//!
//! `OAuth2` for IMAP logins: authorization code flow with PKCE, token
//! refresh and the XOAUTH2 SASL string.
//!
//! A login attempt looks like this:
//!
//! ```ignore
//! use std::time::Duration;
//! use mailsync_oauth::{AuthorizationCallback, AuthorizationCodeFlow, OAuthClient, Provider};
//!
//! let client = OAuthClient::new("client-id", Provider::microsoft()?)
//!     .with_redirect_uri("http://localhost:8080/callback");
//! let flow = AuthorizationCodeFlow::new(client);
//!
//! let (pending, sender) = flow.begin(None)?;
//! println!("Visit: {}", pending.url());
//!
//! // The redirect listener hands over what it captured.
//! sender.deliver(AuthorizationCallback::from_query("code=...&state=..."))?;
//!
//! let token = pending.complete(flow.client(), Duration::from_secs(300)).await?;
//! ```
//!
//! The token is then used with
//! [`sasl::xoauth2_initial_response`] and refreshed through
//! [`OAuthClient::refresh_token`] once [`Token::is_expired`] reports true.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod sasl;
pub mod token;

pub use error::{Error, Result};
pub use flow::{
    AuthorizationCallback, AuthorizationCodeFlow, CodeReceiver, CodeSender, OAuthClient,
    PendingAuthorization, PkceChallenge, code_handoff,
};
pub use provider::Provider;
pub use token::Token;
