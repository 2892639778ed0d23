//! Loopback listener that captures the OAuth redirect.

use anyhow::{Context, Result, bail};
use mailsync_oauth::{AuthorizationCallback, CodeSender};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info};
use url::Url;

const DONE_PAGE: &str = "<html><body><p>Sign-in received. You can close this window.</p></body></html>";

/// Binds the redirect URI's port on localhost.
pub async fn bind(redirect_uri: &str) -> Result<TcpListener> {
    let url = Url::parse(redirect_uri).context("invalid redirect URI")?;
    let port = url
        .port_or_known_default()
        .context("redirect URI has no port")?;

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("cannot listen on port {port}"))?;
    info!(port, "waiting for the OAuth redirect");
    Ok(listener)
}

/// Serves requests until one carries a `state` and hands it to `sender`.
pub async fn capture(listener: TcpListener, sender: CodeSender) -> Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let (read, mut write) = socket.into_split();

        let mut line = String::new();
        BufReader::new(read).read_line(&mut line).await?;

        let Some(query) = request_query(&line) else {
            debug!(%peer, request = line.trim_end(), "ignoring request");
            write.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await?;
            continue;
        };

        let callback = AuthorizationCallback::from_query(query);
        if callback.state.is_empty() {
            write.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n").await?;
            continue;
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{DONE_PAGE}",
            DONE_PAGE.len()
        );
        write.write_all(response.as_bytes()).await?;
        write.shutdown().await.ok();

        return sender.deliver(callback).map_err(anyhow::Error::from);
    }
}

/// The query of a `GET` request line, if it has one.
fn request_query(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let (_, query) = parts.next()?.split_once('?')?;
    Some(query)
}

/// Fails early when the redirect URI cannot be served from this machine.
pub fn ensure_loopback(redirect_uri: &str) -> Result<()> {
    let url = Url::parse(redirect_uri).context("invalid redirect URI")?;
    match url.host_str() {
        Some("localhost" | "127.0.0.1" | "[::1]") => Ok(()),
        other => bail!("redirect URI host {other:?} is not a loopback address"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailsync_oauth::code_handoff;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    #[test]
    fn test_request_query() {
        assert_eq!(
            request_query("GET /callback?code=abc&state=xyz HTTP/1.1\r\n"),
            Some("code=abc&state=xyz")
        );
        assert_eq!(request_query("GET /favicon.ico HTTP/1.1\r\n"), None);
        assert_eq!(request_query("POST /callback?code=abc HTTP/1.1\r\n"), None);
        assert_eq!(request_query(""), None);
    }

    #[test]
    fn test_ensure_loopback() {
        assert!(ensure_loopback("http://localhost:9498/callback").is_ok());
        assert!(ensure_loopback("http://127.0.0.1:9498/callback").is_ok());
        assert!(ensure_loopback("https://app.example.com/callback").is_err());
    }

    #[tokio::test]
    async fn test_capture_delivers_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (sender, receiver) = code_handoff("xyz");
        let server = tokio::spawn(capture(listener, sender));

        let mut stray = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stray.write_all(b"GET /favicon.ico HTTP/1.1\r\n").await.unwrap();
        let mut reply = String::new();
        stray.read_to_string(&mut reply).await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 404"));

        let mut browser = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        browser
            .write_all(b"GET /callback?code=abc&state=xyz HTTP/1.1\r\n")
            .await
            .unwrap();
        let mut reply = String::new();
        browser.read_to_string(&mut reply).await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 200"));

        server.await.unwrap().unwrap();
        assert_eq!(receiver.wait(Duration::from_secs(1)).await.unwrap(), "abc");
    }
}
