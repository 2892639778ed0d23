//! Decoding failures.

/// Result type alias for body extraction.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a message body could not be extracted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `Content-Type` without a usable `type/subtype`.
    #[error("Malformed content type: {0}")]
    InvalidContentType(String),

    /// A base64 part that does not decode.
    #[error("Bad base64 part: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// `multipart/*` entity with no `boundary` parameter.
    #[error("Multipart entity has no boundary")]
    MissingBoundary,

    /// Boundary lines that do not delimit any part.
    #[error("Malformed multipart body: {0}")]
    InvalidMultipart(String),
}
