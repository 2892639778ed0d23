//! In-memory mail server for syncer tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{MailProtocol, new_uids, page_window};
use crate::session::SessionTarget;
use crate::store::{Envelope, RemoteMessage};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct State {
    mailboxes: Vec<String>,
    messages: HashMap<String, BTreeMap<u32, Envelope>>,
    raw: HashMap<(String, u32), Vec<u8>>,
    unreadable: HashSet<(String, u32)>,
    sessions: usize,
    list_calls: usize,
    envelope_fetches: usize,
    fetched_uids: Vec<u32>,
    body_fetches: usize,
    failure: Option<Failure>,
}

/// Failure injected into every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transport,
    Authentication,
}

/// Scriptable [`MailProtocol`] that counts what it is asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockProtocol {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Gate>>,
}

/// Holds calls inside the session until released.
#[derive(Debug, Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl MockProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits on the gate after opening its session.
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            state: Arc::default(),
            gate: Some(gate),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_mailboxes(&self, names: &[&str]) {
        self.state().mailboxes = names.iter().map(ToString::to_string).collect();
    }

    pub fn add_message(&self, mailbox: &str, uid: u32, subject: &str) {
        let envelope = Envelope {
            subject: Some(subject.to_string()),
            ..Envelope::default()
        };
        self.state()
            .messages
            .entry(mailbox.to_string())
            .or_default()
            .insert(uid, envelope);
    }

    /// The message exists but its envelope never makes it into a batch,
    /// like a FETCH line the parser has to skip.
    pub fn add_unreadable(&self, mailbox: &str, uid: u32) {
        self.add_message(mailbox, uid, "unreadable");
        self.state().unreadable.insert((mailbox.to_string(), uid));
    }

    pub fn set_raw(&self, mailbox: &str, uid: u32, raw: &[u8]) {
        self.state().raw.insert((mailbox.to_string(), uid), raw.to_vec());
    }

    pub fn fail_with(&self, failure: Option<Failure>) {
        self.state().failure = failure;
    }

    pub fn sessions(&self) -> usize {
        self.state().sessions
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn envelope_fetches(&self) -> usize {
        self.state().envelope_fetches
    }

    pub fn fetched_uids(&self) -> Vec<u32> {
        self.state().fetched_uids.clone()
    }

    pub fn body_fetches(&self) -> usize {
        self.state().body_fetches
    }

    async fn open(&self) -> Result<()> {
        let failure = {
            let mut state = self.state();
            state.sessions += 1;
            state.failure
        };
        match failure {
            Some(Failure::Transport) => {
                return Err(Error::Transport("connection refused".to_string()));
            }
            Some(Failure::Authentication) => {
                return Err(Error::Authentication("invalid credentials".to_string()));
            }
            None => {}
        }

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(())
    }
}

#[async_trait]
impl MailProtocol for MockProtocol {
    async fn verify(&self, _target: &SessionTarget) -> Result<()> {
        self.open().await
    }

    async fn list_mailboxes(&self, _target: &SessionTarget) -> Result<Vec<String>> {
        self.open().await?;
        let mut state = self.state();
        state.list_calls += 1;
        Ok(state.mailboxes.clone())
    }

    async fn fetch_new_messages(
        &self,
        _target: &SessionTarget,
        mailbox: &str,
        known: &HashSet<u32>,
    ) -> Result<Vec<RemoteMessage>> {
        self.open().await?;
        let mut state = self.state();
        let Some(remote) = state.messages.get(mailbox) else {
            return Ok(Vec::new());
        };

        let uids: Vec<u32> = remote.keys().copied().collect();
        let fresh = new_uids(&uids, known);
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let messages: Vec<RemoteMessage> = fresh
            .iter()
            .filter(|uid| !state.unreadable.contains(&(mailbox.to_string(), **uid)))
            .filter_map(|uid| {
                remote.get(uid).map(|envelope| RemoteMessage {
                    uid: *uid,
                    envelope: envelope.clone(),
                })
            })
            .collect();
        state.envelope_fetches += 1;
        state.fetched_uids.extend(&fresh);
        Ok(messages)
    }

    async fn fetch_raw_message(
        &self,
        _target: &SessionTarget,
        mailbox: &str,
        uid: u32,
    ) -> Result<Vec<u8>> {
        self.open().await?;
        let mut state = self.state();
        state.body_fetches += 1;
        state
            .raw
            .get(&(mailbox.to_string(), uid))
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("no body section for UID {uid}")))
    }

    async fn browse(
        &self,
        _target: &SessionTarget,
        mailbox: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>> {
        self.open().await?;
        let state = self.state();
        let Some(remote) = state.messages.get(mailbox) else {
            return Ok(Vec::new());
        };
        let uids: Vec<u32> = remote.keys().copied().collect();
        Ok(page_window(&uids, start, limit)
            .into_iter()
            .filter_map(|uid| {
                remote.get(&uid).map(|envelope| RemoteMessage {
                    uid,
                    envelope: envelope.clone(),
                })
            })
            .collect())
    }
}
