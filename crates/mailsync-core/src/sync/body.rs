//! Fetch-once message bodies.

use tracing::{debug, warn};

use super::SyncContext;
use crate::account::AccountId;
use crate::store::CachedBody;
use crate::{Error, Result};

/// Returned when a message was fetched but holds neither a plain nor an
/// HTML body.
pub const BODY_ERROR_SENTINEL: &str = "Error retrieving email body";

impl SyncContext {
    /// The message body, HTML preferred over plain text.
    ///
    /// A cached body is returned without touching the network, even after
    /// logout. Otherwise the raw message is fetched, decoded and both parts
    /// are cached. A message with no text part, or one whose MIME structure
    /// is unusable, yields [`BODY_ERROR_SENTINEL`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the body must be fetched and
    /// the account is not logged in (rejected credentials also sign it out),
    /// and transport, protocol or database failures otherwise.
    pub async fn get_body(&self, id: AccountId, mailbox: &str, uid: u32) -> Result<String> {
        let cached = self.store.cached_body(id, mailbox, uid).await?;
        if let Some(body) = cached.as_ref().and_then(CachedBody::preferred) {
            debug!(account = %id, mailbox, uid, "body served from cache");
            return Ok(body.to_string());
        }

        let Some(account) = self.logged_in_account(id).await? else {
            return Err(Error::Authentication(format!("account {id} is not logged in")));
        };

        let raw = match self.target(&account).await {
            Ok(target) => self.protocol.fetch_raw_message(&target, mailbox, uid).await,
            Err(e) => Err(e),
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                warn!(account = %id, mailbox, uid, error = %e, "body fetch failed");
                if e.is_authentication() {
                    self.sign_out(id).await?;
                }
                return Err(e);
            }
        };

        let body = match mailsync_mime::extract_body(&raw) {
            Ok(body) => CachedBody::from(body),
            Err(e) => {
                warn!(account = %id, mailbox, uid, error = %e, "could not decode message body");
                return Ok(BODY_ERROR_SENTINEL.to_string());
            }
        };

        if !self.store.store_body(id, mailbox, uid, &body).await? {
            debug!(account = %id, mailbox, uid, "message not cached, body not stored");
        }

        Ok(body
            .preferred()
            .map_or_else(|| BODY_ERROR_SENTINEL.to_string(), ToString::to_string))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::mock::Failure;
    use crate::store::{Envelope, RemoteMessage};
    use crate::sync::testing::{Fixture, fixture};

    const ALTERNATIVE: &[u8] = b"Subject: hi\r\n\
Content-Type: multipart/alternative; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain; charset=us-ascii\r\n\
Content-Transfer-Encoding: 7bit\r\n\
\r\n\
Hello there\r\n\
--sep\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<p>Hello =3D there</p>\r\n\
--sep--\r\n";

    async fn cache_message(fx: &Fixture, uid: u32) {
        fx.ctx
            .store()
            .insert_messages(
                fx.account,
                "INBOX",
                &[RemoteMessage {
                    uid,
                    envelope: Envelope::default(),
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_multipart_html_is_decoded_and_cached() {
        let fx = fixture().await;
        cache_message(&fx, 4).await;
        fx.remote.set_raw("INBOX", 4, ALTERNATIVE);

        let body = fx.ctx.get_body(fx.account, "INBOX", 4).await.unwrap();
        assert_eq!(body, "<p>Hello = there</p>");

        let cached = fx
            .ctx
            .store()
            .cached_body(fx.account, "INBOX", 4)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.plain, "Hello there");
        assert_eq!(cached.html, "<p>Hello = there</p>");

        let again = fx.ctx.get_body(fx.account, "INBOX", 4).await.unwrap();
        assert_eq!(again, body);
        assert_eq!(fx.remote.body_fetches(), 1);
    }

    #[tokio::test]
    async fn test_plain_only_body() {
        let fx = fixture().await;
        cache_message(&fx, 1).await;
        fx.remote.set_raw("INBOX", 1, b"Subject: x\r\n\r\njust text");

        assert_eq!(fx.ctx.get_body(fx.account, "INBOX", 1).await.unwrap(), "just text");
    }

    #[tokio::test]
    async fn test_no_text_part_returns_sentinel() {
        let fx = fixture().await;
        cache_message(&fx, 2).await;
        fx.remote.set_raw(
            "INBOX",
            2,
            b"Content-Type: multipart/mixed; boundary=m\r\n\r\n\
--m\r\nContent-Type: image/png\r\n\r\n\x89PNG\r\n--m--\r\n",
        );

        let body = fx.ctx.get_body(fx.account, "INBOX", 2).await.unwrap();
        assert_eq!(body, BODY_ERROR_SENTINEL);
    }

    #[tokio::test]
    async fn test_single_part_non_text_is_shown_as_plain() {
        let fx = fixture().await;
        cache_message(&fx, 9).await;
        fx.remote.set_raw(
            "INBOX",
            9,
            b"Content-Type: application/octet-stream\r\n\r\nrawdata",
        );

        assert_eq!(fx.ctx.get_body(fx.account, "INBOX", 9).await.unwrap(), "rawdata");
        let cached = fx
            .ctx
            .store()
            .cached_body(fx.account, "INBOX", 9)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.plain, "rawdata");
    }

    #[tokio::test]
    async fn test_cached_body_survives_logout() {
        let fx = fixture().await;
        cache_message(&fx, 4).await;
        cache_message(&fx, 7).await;
        fx.remote.set_raw("INBOX", 4, ALTERNATIVE);
        fx.ctx.get_body(fx.account, "INBOX", 4).await.unwrap();

        fx.ctx.sign_out(fx.account).await.unwrap();

        let body = fx.ctx.get_body(fx.account, "INBOX", 4).await.unwrap();
        assert_eq!(body, "<p>Hello = there</p>");
        assert_eq!(fx.remote.body_fetches(), 1);

        let err = fx.ctx.get_body(fx.account, "INBOX", 7).await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(fx.remote.sessions(), 1);
    }

    #[tokio::test]
    async fn test_missing_boundary_returns_sentinel() {
        let fx = fixture().await;
        cache_message(&fx, 3).await;
        fx.remote
            .set_raw("INBOX", 3, b"Content-Type: multipart/mixed\r\n\r\nbody");

        let body = fx.ctx.get_body(fx.account, "INBOX", 3).await.unwrap();
        assert_eq!(body, BODY_ERROR_SENTINEL);
    }

    #[tokio::test]
    async fn test_network_failure_is_an_error_not_the_sentinel() {
        let fx = fixture().await;
        cache_message(&fx, 5).await;
        fx.remote.fail_with(Some(Failure::Transport));

        let err = fx.ctx.get_body(fx.account, "INBOX", 5).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_missing_body_section_is_protocol_error() {
        let fx = fixture().await;
        cache_message(&fx, 6).await;

        let err = fx.ctx.get_body(fx.account, "INBOX", 6).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_uncached_message_body_is_still_returned() {
        let fx = fixture().await;
        fx.remote.set_raw("INBOX", 8, b"Subject: x\r\n\r\nloose");

        assert_eq!(fx.ctx.get_body(fx.account, "INBOX", 8).await.unwrap(), "loose");
        assert_eq!(
            fx.ctx.store().cached_body(fx.account, "INBOX", 8).await.unwrap(),
            None
        );
    }
}
