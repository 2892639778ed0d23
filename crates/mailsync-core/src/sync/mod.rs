//! Reconciling remote state into the cache.
//!
//! [`SyncContext`] bundles what every sync needs: the store, the protocol,
//! credentials, the event sink and the guard registry. The mailbox and
//! message syncers and the body fetcher are methods on it, so one context
//! can be cloned into scheduler tasks cheaply.
//!
//! Each sync call follows the same order: claim the guard, check that the
//! account is still logged in, talk to the server, write in one
//! transaction, then notify.

mod body;
mod guard;
mod mailboxes;
mod messages;

use std::sync::Arc;

use tracing::{info, warn};

use crate::account::{Account, AccountId, CredentialProvider};
use crate::notify::{EventNotifier, SyncEvent};
use crate::protocol::MailProtocol;
use crate::session::SessionTarget;
use crate::store::{CacheEntity, CacheStore, ConsistencyPolicy};
use crate::{Error, Result};

pub use body::BODY_ERROR_SENTINEL;
pub use guard::{GuardKey, SyncGuards, SyncPermit};

/// Default IMAP port over implicit TLS.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// What a sync call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The same sync was already running; nothing was done.
    Skipped,
    /// The account is not logged in, or was signed out because the server
    /// rejected its credentials.
    LoggedOut,
    /// The server matched the cache; nothing was written.
    Unchanged,
    /// This many rows were written.
    Updated(usize),
}

/// Shared state for sync operations.
#[derive(Clone)]
pub struct SyncContext {
    store: CacheStore,
    protocol: Arc<dyn MailProtocol>,
    credentials: CredentialProvider,
    notifier: Arc<dyn EventNotifier>,
    guards: SyncGuards,
    imap_port: u16,
    mailbox_policy: ConsistencyPolicy,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("store", &self.store)
            .field("guards", &self.guards)
            .field("imap_port", &self.imap_port)
            .field("mailbox_policy", &self.mailbox_policy)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    /// Creates a context with the default port and cache policies.
    #[must_use]
    pub fn new(
        store: CacheStore,
        protocol: Arc<dyn MailProtocol>,
        credentials: CredentialProvider,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            store,
            protocol,
            credentials,
            notifier,
            guards: SyncGuards::new(),
            imap_port: DEFAULT_IMAP_PORT,
            mailbox_policy: CacheEntity::Mailboxes.default_policy(),
        }
    }

    /// Port used when an account's IMAP address has none.
    #[must_use]
    pub const fn with_imap_port(mut self, port: u16) -> Self {
        self.imap_port = port;
        self
    }

    /// Freshness rule for the mailbox list.
    #[must_use]
    pub const fn with_mailbox_policy(mut self, policy: ConsistencyPolicy) -> Self {
        self.mailbox_policy = policy;
        self
    }

    /// The cache.
    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The remote operations.
    #[must_use]
    pub fn protocol(&self) -> &dyn MailProtocol {
        self.protocol.as_ref()
    }

    /// The guard registry.
    #[must_use]
    pub const fn guards(&self) -> &SyncGuards {
        &self.guards
    }

    /// Port used when an account's IMAP address has none.
    #[must_use]
    pub const fn imap_port(&self) -> u16 {
        self.imap_port
    }

    /// Announces `event`.
    pub fn notify(&self, event: SyncEvent) {
        self.notifier.notify(event);
    }

    /// The account if it exists and still has credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn logged_in_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self
            .store
            .account(id)
            .await?
            .filter(Account::is_logged_in))
    }

    /// Session target for `account`, refreshing its token when needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if no usable credential exists and
    /// [`Error::Config`] for a bad IMAP address.
    pub async fn target(&self, account: &Account) -> Result<SessionTarget> {
        let auth = self.credentials.authenticate(account).await?;
        SessionTarget::for_account(account, self.imap_port, auth)
    }

    /// Clears the account's credentials and announces the logout.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist or the update fails.
    pub async fn sign_out(&self, id: AccountId) -> Result<()> {
        self.store.clear_credentials(id).await?;
        info!(account = %id, "account signed out");
        self.notify(SyncEvent::UserLoggedOut { account: id });
        Ok(())
    }

    /// Maps a failed remote call to an outcome. Rejected credentials sign
    /// the account out; everything else is returned to the caller.
    async fn settle(&self, id: AccountId, err: Error) -> Result<SyncOutcome> {
        if err.is_authentication() {
            warn!(account = %id, error = %err, "credentials rejected, signing out");
            self.sign_out(id).await?;
            return Ok(SyncOutcome::LoggedOut);
        }
        Err(err)
    }
}
