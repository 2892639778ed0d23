//! New-message reconciliation for one mailbox.

use tracing::{debug, info};

use super::{GuardKey, SyncContext, SyncOutcome};
use crate::Result;
use crate::account::AccountId;
use crate::notify::SyncEvent;

impl SyncContext {
    /// Caches envelopes of messages the server has and the cache lacks.
    ///
    /// Only UIDs missing locally are fetched; cached envelopes are never
    /// fetched again. Messages gone from the server stay cached.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and database failures. Rejected
    /// credentials sign the account out and yield
    /// [`SyncOutcome::LoggedOut`] instead.
    pub async fn sync_messages(&self, id: AccountId, mailbox: &str) -> Result<SyncOutcome> {
        let key = GuardKey::Messages(id, mailbox.to_string());
        let Some(_permit) = self.guards.try_acquire(key) else {
            debug!(account = %id, mailbox, "message sync already running");
            return Ok(SyncOutcome::Skipped);
        };
        let Some(account) = self.logged_in_account(id).await? else {
            return Ok(SyncOutcome::LoggedOut);
        };

        let known = self.store.cached_uids(id, mailbox).await?;
        let fetched = match self.target(&account).await {
            Ok(target) => self.protocol.fetch_new_messages(&target, mailbox, &known).await,
            Err(e) => Err(e),
        };
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => return self.settle(id, e).await,
        };

        if fetched.is_empty() {
            debug!(account = %id, mailbox, cached = known.len(), "no new messages");
            return Ok(SyncOutcome::Unchanged);
        }
        if self.logged_in_account(id).await?.is_none() {
            debug!(account = %id, mailbox, "signed out during message sync, discarding result");
            return Ok(SyncOutcome::LoggedOut);
        }

        let inserted = self.store.insert_messages(id, mailbox, &fetched).await?;
        if inserted == 0 {
            return Ok(SyncOutcome::Unchanged);
        }

        info!(account = %id, mailbox, new = inserted, "messages cached");
        self.notify(SyncEvent::MessagesUpdated {
            account: id,
            mailbox: mailbox.to_string(),
        });
        Ok(SyncOutcome::Updated(inserted))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::protocol::mock::{Failure, Gate, MockProtocol};
    use crate::store::{Envelope, RemoteMessage};
    use crate::sync::testing::{fixture, fixture_with};

    #[tokio::test]
    async fn test_only_missing_uid_is_fetched() {
        let mut fx = fixture().await;
        for uid in 1..=3 {
            fx.remote.add_message("INBOX", uid, &format!("message {uid}"));
        }
        let cached: Vec<RemoteMessage> = (1..=2)
            .map(|uid| RemoteMessage {
                uid,
                envelope: Envelope::default(),
            })
            .collect();
        fx.ctx
            .store()
            .insert_messages(fx.account, "INBOX", &cached)
            .await
            .unwrap();

        let outcome = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();

        assert_eq!(outcome, SyncOutcome::Updated(1));
        assert_eq!(fx.remote.fetched_uids(), [3]);
        assert_eq!(fx.ctx.store().message_count(fx.account, "INBOX").await.unwrap(), 3);
        assert_eq!(
            fx.events(),
            [SyncEvent::MessagesUpdated {
                account: fx.account,
                mailbox: "INBOX".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_second_sync_fetches_nothing() {
        let mut fx = fixture().await;
        fx.remote.add_message("INBOX", 10, "a");
        fx.remote.add_message("INBOX", 11, "b");

        assert_eq!(
            fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap(),
            SyncOutcome::Updated(2)
        );
        fx.events();
        let fetches = fx.remote.envelope_fetches();

        let outcome = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(fx.remote.envelope_fetches(), fetches);
        assert!(fx.events().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_envelope_does_not_block_the_batch() {
        let mut fx = fixture().await;
        fx.remote.add_message("INBOX", 1, "first");
        fx.remote.add_unreadable("INBOX", 2);
        fx.remote.add_message("INBOX", 3, "third");

        let outcome = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();

        assert_eq!(outcome, SyncOutcome::Updated(2));
        assert_eq!(
            fx.ctx.store().cached_uids(fx.account, "INBOX").await.unwrap(),
            HashSet::from([1, 3])
        );
        assert_eq!(fx.events().len(), 1);

        // The skipped UID is still missing locally, so the next sync asks again.
        let outcome = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(fx.remote.fetched_uids(), [1, 2, 3, 2]);
    }

    #[tokio::test]
    async fn test_empty_mailbox_is_unchanged() {
        let mut fx = fixture().await;

        let outcome = fx.ctx.sync_messages(fx.account, "Empty").await.unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(fx.remote.envelope_fetches(), 0);
        assert!(fx.events().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_skipped_without_network() {
        let gate = Arc::new(Gate::default());
        let fx = fixture_with(MockProtocol::gated(Arc::clone(&gate))).await;
        fx.remote.add_message("INBOX", 1, "a");

        let ctx = fx.ctx.clone();
        let account = fx.account;
        let first = tokio::spawn(async move { ctx.sync_messages(account, "INBOX").await });

        gate.entered.notified().await;
        assert_eq!(fx.remote.sessions(), 1);

        let second = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();
        assert_eq!(second, SyncOutcome::Skipped);
        assert_eq!(fx.remote.sessions(), 1);

        gate.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), SyncOutcome::Updated(1));
    }

    #[tokio::test]
    async fn test_other_mailbox_is_not_blocked() {
        let fx = fixture().await;
        let _held = fx
            .ctx
            .guards()
            .try_acquire(GuardKey::Messages(fx.account, "INBOX".into()));
        fx.remote.add_message("Sent", 1, "a");

        let outcome = fx.ctx.sync_messages(fx.account, "Sent").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated(1));
    }

    #[tokio::test]
    async fn test_transport_failure_writes_nothing() {
        let mut fx = fixture().await;
        fx.remote.add_message("INBOX", 1, "a");
        fx.remote.fail_with(Some(Failure::Transport));

        let err = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(fx.ctx.store().message_count(fx.account, "INBOX").await.unwrap(), 0);
        assert!(fx.events().is_empty());
        assert!(fx.ctx.logged_in_account(fx.account).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logged_out_account_is_not_synced() {
        let fx = fixture().await;
        fx.remote.add_message("INBOX", 1, "a");
        fx.ctx.store().clear_credentials(fx.account).await.unwrap();

        let outcome = fx.ctx.sync_messages(fx.account, "INBOX").await.unwrap();

        assert_eq!(outcome, SyncOutcome::LoggedOut);
        assert_eq!(fx.remote.sessions(), 0);
    }
}
