//! Periodic sync loops per logged-in account.
//!
//! Starting an account spawns two tokio tasks. The mailbox task runs one
//! immediate pass (mailbox list, then every cached mailbox's messages) and
//! then re-syncs the mailbox list on its interval. The message task
//! re-syncs messages of every cached mailbox on its own interval. Stopping
//! aborts both; a sync already talking to the server may still finish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::account::AccountId;
use crate::sync::{SyncContext, SyncOutcome};

type Loops = Arc<Mutex<HashMap<AccountId, Vec<JoinHandle<()>>>>>;

/// Default period of both loops.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Owns the background sync tasks of every running account.
#[derive(Debug)]
pub struct UpdateScheduler {
    ctx: SyncContext,
    mailbox_interval: Duration,
    message_interval: Duration,
    loops: Loops,
}

impl UpdateScheduler {
    /// Creates a scheduler with the given loop periods.
    #[must_use]
    pub fn new(ctx: SyncContext, mailbox_interval: Duration, message_interval: Duration) -> Self {
        Self {
            ctx,
            mailbox_interval: mailbox_interval.max(Duration::from_millis(1)),
            message_interval: message_interval.max(Duration::from_millis(1)),
            loops: Arc::default(),
        }
    }

    fn loops(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, Vec<JoinHandle<()>>>> {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the loops for `id`. Does nothing if they already run.
    pub fn start(&self, id: AccountId) {
        let mut loops = self.loops();
        if loops.contains_key(&id) {
            debug!(account = %id, "update loops already running");
            return;
        }

        let mailbox_task = {
            let ctx = self.ctx.clone();
            let registry = Arc::clone(&self.loops);
            let period = self.mailbox_interval;
            tokio::spawn(async move {
                if !(mailbox_pass(&ctx, id).await && message_pass(&ctx, id).await) {
                    stop_loops(&registry, id);
                    return;
                }

                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if !mailbox_pass(&ctx, id).await {
                        stop_loops(&registry, id);
                        return;
                    }
                }
            })
        };

        let message_task = {
            let ctx = self.ctx.clone();
            let registry = Arc::clone(&self.loops);
            let period = self.message_interval;
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if !message_pass(&ctx, id).await {
                        stop_loops(&registry, id);
                        return;
                    }
                }
            })
        };

        loops.insert(id, vec![mailbox_task, message_task]);
        info!(
            account = %id,
            mailbox_interval = ?self.mailbox_interval,
            message_interval = ?self.message_interval,
            "update loops started"
        );
    }

    /// Stops the loops for `id`. Returns false if none were running.
    pub fn stop(&self, id: AccountId) -> bool {
        stop_loops(&self.loops, id)
    }

    /// True while `id` has loops.
    #[must_use]
    pub fn is_running(&self, id: AccountId) -> bool {
        self.loops().contains_key(&id)
    }

    /// Accounts with running loops, ascending.
    #[must_use]
    pub fn running(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.loops().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Stops every account's loops.
    pub fn stop_all(&self) {
        let drained: Vec<(AccountId, Vec<JoinHandle<()>>)> = self.loops().drain().collect();
        for (id, handles) in drained {
            handles.iter().for_each(JoinHandle::abort);
            debug!(account = %id, "update loops stopped");
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Removes and aborts the loops of `id`. Called from inside a loop the
/// abort lands on that task's next await, so callers return right after.
fn stop_loops(loops: &Loops, id: AccountId) -> bool {
    let handles = loops
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);

    match handles {
        Some(handles) => {
            info!(account = %id, "update loops stopped");
            handles.iter().for_each(JoinHandle::abort);
            true
        }
        None => false,
    }
}

/// Syncs the mailbox list. Returns false once the account is logged out.
async fn mailbox_pass(ctx: &SyncContext, id: AccountId) -> bool {
    match ctx.sync_mailboxes(id).await {
        Ok(SyncOutcome::LoggedOut) => false,
        Ok(_) => true,
        Err(e) => {
            warn!(account = %id, error = %e, "mailbox sync failed");
            true
        }
    }
}

/// Syncs every cached mailbox. A transport failure ends the pass early.
/// Returns false once the account is logged out.
async fn message_pass(ctx: &SyncContext, id: AccountId) -> bool {
    let mailboxes = match ctx.store().mailboxes(id).await {
        Ok(mailboxes) => mailboxes,
        Err(e) => {
            error!(account = %id, error = %e, "could not read cached mailboxes");
            return true;
        }
    };

    for mailbox in &mailboxes {
        match ctx.sync_messages(id, mailbox).await {
            Ok(SyncOutcome::LoggedOut) => return false,
            Ok(_) => {}
            Err(e) if e.is_transport() => {
                warn!(account = %id, mailbox, error = %e, "message sync aborted");
                return true;
            }
            Err(e) => warn!(account = %id, mailbox, error = %e, "message sync failed, skipping mailbox"),
        }
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::SyncEvent;
    use crate::protocol::mock::Failure;
    use crate::sync::testing::{Fixture, fixture};

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(fx: &mut Fixture) -> SyncEvent {
        tokio::time::timeout(WAIT, fx.events.recv()).await.unwrap().unwrap()
    }

    async fn wait_stopped(scheduler: &UpdateScheduler, id: AccountId) {
        for _ in 0..500 {
            if !scheduler.is_running(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("loops for {id} still running");
    }

    #[tokio::test]
    async fn test_start_runs_immediate_pass() {
        let mut fx = fixture().await;
        fx.remote.set_mailboxes(&["INBOX", "Sent"]);
        fx.remote.add_message("INBOX", 1, "hello");
        fx.remote.add_message("Sent", 2, "reply");
        let scheduler = UpdateScheduler::new(
            fx.ctx.clone(),
            DEFAULT_SYNC_INTERVAL,
            DEFAULT_SYNC_INTERVAL,
        );

        scheduler.start(fx.account);
        assert!(scheduler.is_running(fx.account));

        assert_eq!(
            next_event(&mut fx).await,
            SyncEvent::MailboxesUpdated {
                account: fx.account
            }
        );
        let mut updated = vec![];
        for _ in 0..2 {
            match next_event(&mut fx).await {
                SyncEvent::MessagesUpdated { mailbox, .. } => updated.push(mailbox),
                other => panic!("unexpected event {other:?}"),
            }
        }
        updated.sort();
        assert_eq!(updated, ["INBOX", "Sent"]);

        assert!(scheduler.stop(fx.account));
        assert!(!scheduler.is_running(fx.account));
        assert!(!scheduler.stop(fx.account));
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_set_of_loops() {
        let fx = fixture().await;
        let scheduler = UpdateScheduler::new(
            fx.ctx.clone(),
            DEFAULT_SYNC_INTERVAL,
            DEFAULT_SYNC_INTERVAL,
        );

        scheduler.start(fx.account);
        scheduler.start(fx.account);
        assert_eq!(scheduler.running(), [fx.account]);

        scheduler.stop_all();
        assert!(scheduler.running().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials_stop_loops() {
        let mut fx = fixture().await;
        fx.remote.fail_with(Some(Failure::Authentication));
        let scheduler = UpdateScheduler::new(
            fx.ctx.clone(),
            DEFAULT_SYNC_INTERVAL,
            DEFAULT_SYNC_INTERVAL,
        );

        scheduler.start(fx.account);

        assert_eq!(
            next_event(&mut fx).await,
            SyncEvent::UserLoggedOut {
                account: fx.account
            }
        );
        wait_stopped(&scheduler, fx.account).await;
    }

    #[tokio::test]
    async fn test_message_interval_picks_up_new_mail() {
        let mut fx = fixture().await;
        fx.remote.set_mailboxes(&["INBOX"]);
        let scheduler = UpdateScheduler::new(
            fx.ctx.clone(),
            DEFAULT_SYNC_INTERVAL,
            Duration::from_millis(50),
        );

        scheduler.start(fx.account);
        assert!(matches!(
            next_event(&mut fx).await,
            SyncEvent::MailboxesUpdated { .. }
        ));

        fx.remote.add_message("INBOX", 9, "late arrival");
        assert_eq!(
            next_event(&mut fx).await,
            SyncEvent::MessagesUpdated {
                account: fx.account,
                mailbox: "INBOX".into(),
            }
        );
        assert_eq!(
            fx.ctx.store().message_count(fx.account, "INBOX").await.unwrap(),
            1
        );
        scheduler.stop_all();
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_loops_running() {
        let fx = fixture().await;
        fx.remote.fail_with(Some(Failure::Transport));
        let scheduler = UpdateScheduler::new(
            fx.ctx.clone(),
            Duration::from_millis(20),
            Duration::from_millis(20),
        );

        scheduler.start(fx.account);
        for _ in 0..200 {
            if fx.remote.sessions() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(fx.remote.sessions() >= 3);
        assert!(scheduler.is_running(fx.account));
        scheduler.stop_all();
    }
}
