//! # mailsync-core
//!
//! Mail synchronization and cache engine.
//!
//! The engine mirrors IMAP mailboxes and message envelopes into a local
//! `SQLite` cache and serves reads from it with bounded staleness:
//!
//! - the mailbox list is served from cache for a TTL and replaced as a set
//!   when the server's list differs
//! - message envelopes are reconciled by UID difference, so only new
//!   messages are ever fetched
//! - bodies are fetched on first read, MIME-decoded and kept forever
//!
//! Syncs run from per-account update loops or on demand. Overlapping runs
//! of the same sync are skipped, not queued. Rejected credentials sign the
//! account out and announce it through an [`EventNotifier`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailsync_core::{BroadcastNotifier, Engine, EngineConfig};
//!
//! let notifier = Arc::new(BroadcastNotifier::default());
//! let engine = Engine::open(EngineConfig::default(), notifier.clone()).await?;
//! engine.restore().await?;
//!
//! let id = engine.login_password("imap.example.com:993", "me@example.com", "secret").await?;
//! for mailbox in engine.get_mailboxes(id).await? {
//!     let page = engine.get_emails(id, &mailbox, 0, None).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod engine;
mod error;
pub mod notify;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod sync;

pub use account::{Account, AccountId, AuthMaterial, Credential, CredentialProvider, OAuthCredential};
pub use config::{EngineConfig, OAuthSettings};
pub use engine::{Engine, OAuthLogin};
pub use error::{Error, Result};
pub use notify::{BroadcastNotifier, EventNotifier, SyncEvent};
pub use protocol::{ImapProtocol, MailProtocol};
pub use scheduler::UpdateScheduler;
pub use session::{Session, SessionTarget, with_session};
pub use store::{CacheStore, CachedBody, Envelope, MessageSummary, RemoteMessage};
pub use sync::{BODY_ERROR_SENTINEL, SyncContext, SyncOutcome};
