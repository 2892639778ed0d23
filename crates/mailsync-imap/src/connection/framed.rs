//! Response framing.
//!
//! A response is one CRLF-terminated line, extended by every literal
//! announced at a line end: `{n}\r\n` is followed by exactly n raw bytes and
//! then the rest of the response.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8192;

/// Longest line accepted between literals.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted. Full message downloads go through literals, so
/// this also caps the size of a fetched message.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered reader and writer speaking IMAP framing.
pub struct FramedStream<S> {
    inner: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();

        loop {
            let start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(size) = literal_size(&response[start..]) else {
                return Ok(response.freeze());
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {size} bytes (limit {MAX_LITERAL_SIZE})"
                )));
            }

            let offset = response.len();
            response.resize(offset + size, 0);
            self.inner.read_exact(&mut response[offset..]).await?;
        }
    }

    async fn read_line_into(&mut self, out: &mut BytesMut) -> Result<()> {
        let start = out.len();

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    out.extend_from_slice(&available[..=pos]);
                    self.inner.consume(pos + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    out.extend_from_slice(available);
                    self.inner.consume(len);
                }
            }

            if out.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes bytes and flushes.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.inner.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Returns n when the line ends with a literal announcement `{n}` or
/// `{n+}`.
fn literal_size(line: &[u8]) -> Option<usize> {
    let line = line
        .strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);

    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
