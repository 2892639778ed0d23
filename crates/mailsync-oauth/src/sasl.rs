//! XOAUTH2 SASL initial response.
//!
//! Format: `user={user}\x01auth=Bearer {token}\x01\x01`, base64-encoded when
//! sent on the wire.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Builds the raw (unencoded) XOAUTH2 initial response.
#[must_use]
pub fn xoauth2_initial_response(user: &str, token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes()
}

/// Builds the base64-encoded XOAUTH2 initial response.
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(xoauth2_initial_response(user, token))
}
