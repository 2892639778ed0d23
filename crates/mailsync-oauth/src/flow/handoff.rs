//! Single-use handoff of the authorization code from the redirect capture.
//!
//! Each login attempt creates one sender/receiver pair bound to a fresh
//! `state` value. The redirect capture delivers what it saw through the
//! sender; the receiver checks `state` before releasing the code.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{Error, Result};

/// Query parameters captured from the provider's redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationCallback {
    /// `state` echoed by the provider.
    pub state: String,
    /// Authorization code, absent when the request was refused.
    pub code: Option<String>,
    /// `error` parameter, if the provider refused.
    pub error: Option<String>,
    /// `error_description` parameter.
    pub error_description: Option<String>,
}

impl AuthorizationCallback {
    /// Parses a redirect query string such as `code=abc&state=xyz`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut callback = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "state" => callback.state = value.into_owned(),
                "code" => callback.code = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                "error_description" => callback.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        callback
    }
}

/// Sending half, handed to the redirect capture.
#[derive(Debug)]
pub struct CodeSender {
    state: String,
    tx: oneshot::Sender<AuthorizationCallback>,
}

/// Receiving half, kept by the login attempt.
#[derive(Debug)]
pub struct CodeReceiver {
    state: String,
    rx: oneshot::Receiver<AuthorizationCallback>,
}

/// Creates the handoff pair for one login attempt.
#[must_use]
pub fn code_handoff(state: impl Into<String>) -> (CodeSender, CodeReceiver) {
    let state = state.into();
    let (tx, rx) = oneshot::channel();
    (
        CodeSender {
            state: state.clone(),
            tx,
        },
        CodeReceiver { state, rx },
    )
}

impl CodeSender {
    /// The `state` value the redirect is expected to carry.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Delivers the captured redirect. Consumes the sender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandoffClosed`] if the login attempt was abandoned.
    pub fn deliver(self, callback: AuthorizationCallback) -> Result<()> {
        self.tx.send(callback).map_err(|_| Error::HandoffClosed)
    }
}

impl CodeReceiver {
    /// The `state` value issued for this attempt.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Waits for the redirect and returns the validated code.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if nothing arrives within `timeout`
    /// - [`Error::HandoffClosed`] if the sender was dropped
    /// - [`Error::StateMismatch`] if `state` differs from the issued value
    /// - [`Error::AccessDenied`] if the provider returned an error
    /// - [`Error::MissingCode`] if there is neither error nor code
    pub async fn wait(self, timeout: Duration) -> Result<String> {
        let callback = tokio::time::timeout(timeout, self.rx)
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs()))?
            .map_err(|_| Error::HandoffClosed)?;

        if callback.state != self.state {
            warn!("authorization redirect with unexpected state");
            return Err(Error::StateMismatch);
        }
        if let Some(error) = callback.error {
            return Err(Error::AccessDenied(
                callback.error_description.unwrap_or(error),
            ));
        }
        callback
            .code
            .filter(|code| !code.is_empty())
            .ok_or(Error::MissingCode)
    }
}
