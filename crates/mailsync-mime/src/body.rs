//! Displayable body extraction.
//!
//! Walks a message and keeps the last `text/plain` and the last `text/html`
//! leaf it finds, decoded to Unicode. Nested multiparts are descended into.
//! A single-part message is always shown: HTML when it says so, plain text
//! whatever its media type otherwise.

use tracing::{debug, warn};

use crate::error::Result;
use crate::message::Entity;

/// Maximum multipart nesting followed before giving up on a branch.
const MAX_DEPTH: usize = 16;

/// Decoded text bodies of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailBody {
    /// Last `text/plain` part, decoded.
    pub plain: String,
    /// Last `text/html` part, decoded.
    pub html: String,
}

impl EmailBody {
    /// Returns the HTML body if non-empty, else the plain body if
    /// non-empty, else `None`.
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        if !self.html.is_empty() {
            Some(&self.html)
        } else if !self.plain.is_empty() {
            Some(&self.plain)
        } else {
            None
        }
    }

    /// Returns true if neither body was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.html.is_empty()
    }
}

/// Extracts the plain and HTML bodies from a raw message.
///
/// # Errors
///
/// Returns an error when the top-level entity is multipart but its boundary
/// is missing or never appears. Problems inside nested parts are logged and
/// that part is skipped.
pub fn extract_body(raw: &[u8]) -> Result<EmailBody> {
    let entity = Entity::parse(raw);
    let mut body = EmailBody::default();

    if entity.content_type().is_multipart() {
        for part in entity.parts()? {
            collect(&part, &mut body, 1);
        }
    } else if entity.content_type().is("text", "html") {
        body.html = decode_text(&entity);
    } else {
        body.plain = decode_text(&entity);
    }

    Ok(body)
}

fn collect(entity: &Entity, body: &mut EmailBody, depth: usize) {
    let content_type = entity.content_type();

    if content_type.is_multipart() {
        if depth >= MAX_DEPTH {
            warn!(depth, "multipart nesting too deep, skipping");
            return;
        }
        match entity.parts() {
            Ok(parts) => {
                for part in &parts {
                    collect(part, body, depth + 1);
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed nested multipart"),
        }
        return;
    }

    let is_html = content_type.is("text", "html");
    if !is_html && !content_type.is("text", "plain") {
        debug!(content_type = %content_type, "ignoring non-text part");
        return;
    }

    let text = decode_text(entity);
    if is_html {
        body.html = text;
    } else {
        body.plain = text;
    }
}

/// Decodes a leaf entity's transfer encoding and charset.
///
/// A body that fails to decode is used as raw bytes.
#[must_use]
pub fn decode_text(entity: &Entity) -> String {
    let encoding = entity.transfer_encoding();
    let bytes = encoding.decode(&entity.body).unwrap_or_else(|e| {
        warn!(encoding = %encoding, error = %e, "transfer decoding failed, using raw bytes");
        entity.body.clone()
    });
    crate::encoding::decode_charset(&bytes, entity.content_type().charset())
}
