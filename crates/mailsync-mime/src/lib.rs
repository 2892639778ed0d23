//! # mailsync-mime
//!
//! MIME parsing for message bodies fetched by the sync engine.
//!
//! ## Features
//!
//! - **Entity parsing**: header/body split, folded headers, multipart walk
//! - **Transfer decoding**: Base64 and Quoted-Printable, unknown encodings
//!   passed through
//! - **Charset handling**: UTF-8, US-ASCII and ISO-8859-1, with a logged
//!   UTF-8 fallback for anything else
//! - **Body extraction**: last `text/plain` and last `text/html` part
//!
//! ## Quick Start
//!
//! ```
//! use mailsync_mime::extract_body;
//!
//! let raw = b"Content-Type: text/html\r\n\r\n<p>Hello</p>";
//! let body = extract_body(raw).unwrap();
//! assert_eq!(body.preferred(), Some("<p>Hello</p>"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod body;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use body::{EmailBody, decode_text, extract_body};
pub use content_type::ContentType;
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::{Headers, split_header_body};
pub use message::Entity;
