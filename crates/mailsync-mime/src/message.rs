//! MIME entity structure.

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use crate::header::{Headers, split_header_body};

/// A parsed MIME entity: headers plus the undecoded body bytes.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    /// Entity headers.
    pub headers: Headers,
    /// Body bytes, still transfer-encoded.
    pub body: Vec<u8>,
}

impl Entity {
    /// Parses a raw RFC 5322 message or body part.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_header_body(raw);
        Self {
            headers: Headers::parse(&String::from_utf8_lossy(head)),
            body: body.to_vec(),
        }
    }

    /// Returns the content type, or `text/plain` when the header is absent
    /// or cannot be parsed.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("Content-Type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_default()
    }

    /// Returns the transfer encoding (7bit when absent).
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("Content-Transfer-Encoding")
            .map(TransferEncoding::parse)
            .unwrap_or_default()
    }

    /// Splits a multipart body into its child entities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBoundary`] for a multipart entity without a
    /// boundary parameter and [`Error::InvalidMultipart`] when the body has
    /// no delimiter line at all.
    pub fn parts(&self) -> Result<Vec<Self>> {
        let content_type = self.content_type();
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        let parts = split_multipart(&self.body, boundary)?;
        Ok(parts.into_iter().map(Self::parse).collect())
    }
}

/// Splits a multipart body on `--boundary` delimiter lines.
///
/// The preamble and epilogue are dropped. A missing close delimiter is
/// tolerated: the last part runs to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut saw_delimiter = false;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = trim_line_end(&body[pos..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                saw_delimiter = true;
                if let Some(start) = part_start.take() {
                    parts.push(strip_final_newline(&body[start..pos]));
                }
                if closing {
                    return Ok(parts);
                }
                part_start = Some(line_end);
            }
        }

        pos = line_end;
    }

    if !saw_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter line for boundary {boundary:?}"
        )));
    }
    if let Some(start) = part_start {
        parts.push(&body[start.min(body.len())..]);
    }
    Ok(parts)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Drops the line break that belongs to the following delimiter.
fn strip_final_newline(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MULTIPART: &[u8] = b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
\r\n\
preamble\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--XYZ\r\n\
\r\n\
second\r\n\
--XYZ--\r\n\
epilogue\r\n";

    #[test]
    fn test_entity_defaults() {
        let entity = Entity::parse(b"Subject: x\r\n\r\nhello");
        assert!(entity.content_type().is("text", "plain"));
        assert_eq!(entity.transfer_encoding(), TransferEncoding::SevenBit);
        assert_eq!(entity.body, b"hello");
    }

    #[test]
    fn test_unparsable_content_type_defaults_to_plain() {
        let entity = Entity::parse(b"Content-Type: garbage\r\n\r\nhello");
        assert!(entity.content_type().is("text", "plain"));
    }

    #[test]
    fn test_multipart_parts() {
        let entity = Entity::parse(MULTIPART);
        let parts = entity.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"first");
        assert_eq!(parts[1].body, b"second");
        assert!(parts[1].headers.is_empty());
    }

    #[test]
    fn test_multipart_without_boundary() {
        let entity = Entity::parse(b"Content-Type: multipart/mixed\r\n\r\nbody");
        assert!(matches!(entity.parts(), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_multipart_without_delimiters() {
        let entity = Entity::parse(b"Content-Type: multipart/mixed; boundary=Q\r\n\r\nbody");
        assert!(matches!(entity.parts(), Err(Error::InvalidMultipart(_))));
    }

    #[test]
    fn test_multipart_missing_close_delimiter() {
        let entity =
            Entity::parse(b"Content-Type: multipart/mixed; boundary=Q\n\n--Q\n\nonly part\n");
        let parts = entity.parts().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"only part\n");
    }
}
