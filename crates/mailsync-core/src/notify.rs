//! Cache change announcements.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::account::AccountId;

/// Something in the cache changed. Carries identifiers only; listeners
/// read the new state from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The mailbox list of an account was replaced.
    MailboxesUpdated {
        /// Account whose mailboxes changed.
        account: AccountId,
    },
    /// New messages were cached for a mailbox.
    MessagesUpdated {
        /// Owning account.
        account: AccountId,
        /// Mailbox name.
        mailbox: String,
    },
    /// An account's credentials were cleared.
    UserLoggedOut {
        /// Account that was signed out.
        account: AccountId,
    },
}

/// Receives [`SyncEvent`]s. Delivery is fire and forget.
pub trait EventNotifier: Send + Sync {
    /// Announces `event`. Must not block.
    fn notify(&self, event: SyncEvent);
}

/// Fans events out to any number of subscribers over a tokio broadcast
/// channel. Events sent while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastNotifier {
    /// Creates a notifier buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// A new receiver that sees every event sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventNotifier for BroadcastNotifier {
    fn notify(&self, event: SyncEvent) {
        if self.sender.send(event).is_err() {
            trace!("no event subscribers");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();

        notifier.notify(SyncEvent::MailboxesUpdated {
            account: AccountId(1),
        });
        notifier.notify(SyncEvent::MessagesUpdated {
            account: AccountId(1),
            mailbox: "INBOX".into(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::MailboxesUpdated {
                account: AccountId(1)
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            SyncEvent::MessagesUpdated { mailbox, .. } if mailbox == "INBOX"
        ));
    }

    #[test]
    fn test_notify_without_subscribers_is_silent() {
        BroadcastNotifier::new(0).notify(SyncEvent::UserLoggedOut {
            account: AccountId(2),
        });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SyncEvent::MessagesUpdated {
            account: AccountId(4),
            mailbox: "Sent".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "messages_updated");
        assert_eq!(json["account"], 4);
        assert_eq!(json["mailbox"], "Sent");
    }
}
