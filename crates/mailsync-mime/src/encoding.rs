//! Content-Transfer-Encoding and charset decoding.
//!
//! Decoding here is lenient: an unknown transfer encoding passes the bytes
//! through untouched, and an unknown charset is read as UTF-8.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use crate::error::Result;

/// Content-Transfer-Encoding of a MIME entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII (also used when the header is absent).
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Raw binary.
    Binary,
    /// Base64 (RFC 2045 section 6.8).
    Base64,
    /// Quoted-Printable (RFC 2045 section 6.7).
    QuotedPrintable,
    /// Any other token. The body is passed through as-is.
    Other(String),
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other(value),
        }
    }

    /// Decodes a body according to this encoding.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed Base64. Every other encoding
    /// either decodes leniently or passes the input through.
    pub fn decode(&self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => Ok(decode_quoted_printable(body)),
            Self::SevenBit | Self::EightBit | Self::Binary | Self::Other(_) => Ok(body.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Decodes Base64 data, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the remaining characters are not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` at end of line) are removed. A malformed escape is
/// kept literally rather than rejected.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        match (data.get(i + 1).copied(), data.get(i + 2).copied()) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(hi), Some(lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(h), Some(l)) => {
                    out.push((h << 4) | l);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            // Trailing '=' at end of input is a soft break with no newline.
            (None, _) => i += 1,
            (Some(_), None) => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Converts bytes in the given charset to a `String`.
///
/// UTF-8 and US-ASCII are read directly and ISO-8859-1 is mapped byte for
/// byte. Anything else is logged and read as UTF-8, replacing invalid
/// sequences.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let charset = charset.map(|c| c.trim().to_ascii_lowercase());
    match charset.as_deref() {
        None | Some("" | "utf-8" | "utf8" | "us-ascii" | "ascii") => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        Some("iso-8859-1" | "latin1" | "latin-1") => bytes.iter().map(|&b| char::from(b)).collect(),
        Some(other) => {
            warn!(charset = other, "unsupported charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse(""), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::parse("x-uuencode"),
            TransferEncoding::Other("x-uuencode".to_string())
        );
    }

    #[test]
    fn test_unknown_encoding_passes_through() {
        let raw = b"=3D not decoded \x00\xff";
        let decoded = TransferEncoding::parse("x-custom").decode(raw).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn test_decode_base64_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_decode_base64_invalid() {
        assert!(decode_base64(b"@@@not base64").is_err());
    }

    #[test]
    fn test_decode_quoted_printable() {
        assert_eq!(decode_quoted_printable(b"Hello=20World"), b"Hello World");
        assert_eq!(decode_quoted_printable(b"caf=C3=A9"), "café".as_bytes());
    }

    #[test]
    fn test_decode_quoted_printable_soft_breaks() {
        assert_eq!(decode_quoted_printable(b"long =\r\nline"), b"long line");
        assert_eq!(decode_quoted_printable(b"long =\nline"), b"long line");
    }

    #[test]
    fn test_decode_quoted_printable_malformed_escape_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"tail=4"), b"tail=4");
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(b"plain", None), "plain");
        assert_eq!(decode_charset(b"caf\xe9", Some("ISO-8859-1")), "café");
        assert_eq!(decode_charset("héllo".as_bytes(), Some("x-unknown")), "héllo");
    }

    proptest! {
        #[test]
        fn quoted_printable_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_quoted_printable(&data);
        }

        #[test]
        fn quoted_printable_plain_ascii_is_identity(s in "[a-zA-Z0-9 .,!?]{0,64}") {
            prop_assert_eq!(decode_quoted_printable(s.as_bytes()), s.as_bytes());
        }
    }
}
