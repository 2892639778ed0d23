//! Mailbox list reconciliation.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{GuardKey, SyncContext, SyncOutcome};
use crate::account::AccountId;
use crate::notify::SyncEvent;
use crate::{Error, Result};

impl SyncContext {
    /// Replaces the cached mailbox list when the server's set differs.
    ///
    /// Comparison ignores order. An identical set writes nothing and sends
    /// no event, but marks the cache as freshly confirmed.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and database failures. Rejected
    /// credentials sign the account out and yield
    /// [`SyncOutcome::LoggedOut`] instead.
    pub async fn sync_mailboxes(&self, id: AccountId) -> Result<SyncOutcome> {
        let Some(_permit) = self.guards.try_acquire(GuardKey::Mailboxes(id)) else {
            debug!(account = %id, "mailbox sync already running");
            return Ok(SyncOutcome::Skipped);
        };
        let Some(account) = self.logged_in_account(id).await? else {
            return Ok(SyncOutcome::LoggedOut);
        };

        let remote = match self.target(&account).await {
            Ok(target) => self.protocol.list_mailboxes(&target).await,
            Err(e) => Err(e),
        };
        let remote = match remote {
            Ok(remote) => remote,
            Err(e) => return self.settle(id, e).await,
        };

        if self.logged_in_account(id).await?.is_none() {
            debug!(account = %id, "signed out during mailbox sync, discarding result");
            return Ok(SyncOutcome::LoggedOut);
        }

        let cached: HashSet<String> = self.store.mailboxes(id).await?.into_iter().collect();
        let mut seen = HashSet::new();
        let remote: Vec<String> = remote
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();

        if seen == cached {
            self.store.touch_mailboxes(id).await?;
            debug!(account = %id, count = remote.len(), "mailboxes unchanged");
            return Ok(SyncOutcome::Unchanged);
        }

        self.store.replace_mailboxes(id, &remote).await?;
        info!(account = %id, count = remote.len(), "mailboxes updated");
        self.notify(SyncEvent::MailboxesUpdated { account: id });
        Ok(SyncOutcome::Updated(remote.len()))
    }

    /// The mailbox list, served from cache while it is fresh.
    ///
    /// A stale or empty cache is synced first. If that sync fails and a
    /// cached list exists, the stale list is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the account is not logged in,
    /// or the sync error when there is nothing cached to fall back on.
    pub async fn get_mailboxes(&self, id: AccountId) -> Result<Vec<String>> {
        let updated_at = self.store.mailboxes_updated_at(id).await?;
        if self.mailbox_policy.is_fresh(updated_at, Utc::now()) {
            return self.store.mailboxes(id).await;
        }

        match self.sync_mailboxes(id).await {
            Ok(SyncOutcome::LoggedOut) => {
                Err(Error::Authentication(format!("account {id} is not logged in")))
            }
            Ok(_) => self.store.mailboxes(id).await,
            Err(e) => {
                let cached = self.store.mailboxes(id).await?;
                if cached.is_empty() {
                    return Err(e);
                }
                warn!(account = %id, error = %e, "mailbox sync failed, serving stale list");
                Ok(cached)
            }
        }
    }
}
