//! Non-blocking overlap suppression for sync operations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::account::AccountId;

/// What a sync operation locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuardKey {
    /// Mailbox list sync of one account.
    Mailboxes(AccountId),
    /// Message sync of one mailbox.
    Messages(AccountId, String),
}

/// Registry of operations currently running.
///
/// [`SyncGuards::try_acquire`] never waits: a second caller for the same
/// key gets `None` and is expected to return at once.
#[derive(Debug, Clone, Default)]
pub struct SyncGuards {
    running: Arc<Mutex<HashSet<GuardKey>>>,
}

impl SyncGuards {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, or returns `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self, key: GuardKey) -> Option<SyncPermit> {
        let inserted = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());

        inserted.then(|| SyncPermit {
            running: Arc::clone(&self.running),
            key,
        })
    }

    /// True while `key` is held.
    #[must_use]
    pub fn is_held(&self, key: &GuardKey) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Held for the duration of one sync; releases its key on drop.
#[derive(Debug)]
pub struct SyncPermit {
    running: Arc<Mutex<HashSet<GuardKey>>>,
    key: GuardKey,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guards = SyncGuards::new();
        let key = GuardKey::Messages(AccountId(1), "INBOX".into());

        let permit = guards.try_acquire(key.clone());
        assert!(permit.is_some());
        assert!(guards.try_acquire(key.clone()).is_none());
        assert!(guards.is_held(&key));

        drop(permit);
        assert!(!guards.is_held(&key));
        assert!(guards.try_acquire(key).is_some());
    }

    #[test]
    fn test_keys_are_independent() {
        let guards = SyncGuards::new();

        let _inbox = guards.try_acquire(GuardKey::Messages(AccountId(1), "INBOX".into()));
        assert!(guards
            .try_acquire(GuardKey::Messages(AccountId(1), "Sent".into()))
            .is_some());
        assert!(guards
            .try_acquire(GuardKey::Messages(AccountId(2), "INBOX".into()))
            .is_some());
        assert!(guards.try_acquire(GuardKey::Mailboxes(AccountId(1))).is_some());
    }

    #[test]
    fn test_mailbox_named_like_operation_does_not_collide() {
        let guards = SyncGuards::new();
        let _list = guards.try_acquire(GuardKey::Mailboxes(AccountId(1)));
        assert!(guards
            .try_acquire(GuardKey::Messages(AccountId(1), "mailboxes".into()))
            .is_some());
    }
}
