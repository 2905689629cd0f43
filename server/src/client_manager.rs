//! Connection registry.
//!
//! Every TCP connection gets a session holding its outbound queue. Once a
//! session logs in it is bound to a username, and messages addressed to that
//! player are routed through the binding. The registry never touches game
//! state; the main loop keeps the two in step.

use bytes::Bytes;
use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub type ConnId = u64;

/// Who an outbound message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The session bound to this username.
    Player(String),
    /// Every logged-in session.
    All,
    /// Every logged-in session except this username.
    AllExcept(String),
    /// A specific connection, logged in or not.
    Connection(ConnId),
}

#[derive(Debug)]
pub struct Session {
    pub id: ConnId,
    pub addr: SocketAddr,
    pub username: Option<String>,
    sender: mpsc::UnboundedSender<Bytes>,
}

impl Session {
    pub fn new(id: ConnId, addr: SocketAddr, sender: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            addr,
            username: None,
            sender,
        }
    }

    /// Queues a frame for the writer task. Fails once the writer has gone.
    pub fn send(&self, frame: Bytes) -> bool {
        self.sender.send(frame).is_ok()
    }
}

#[derive(Debug)]
pub struct ClientManager {
    sessions: HashMap<ConnId, Session>,
    by_username: HashMap<String, ConnId>,
    next_id: ConnId,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            by_username: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn add_session(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<Bytes>) -> ConnId {
        let id = self.next_id;
        self.next_id += 1;
        info!("Connection {} opened from {}", id, addr);
        self.sessions.insert(id, Session::new(id, addr, sender));
        id
    }

    /// Drops a session and its username binding.
    pub fn remove_session(&mut self, id: ConnId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        if let Some(name) = &session.username {
            self.by_username.remove(name);
        }
        info!("Connection {} closed", id);
        Some(session)
    }

    pub fn username_of(&self, id: ConnId) -> Option<&str> {
        self.sessions.get(&id)?.username.as_deref()
    }

    pub fn connection_for(&self, username: &str) -> Option<ConnId> {
        self.by_username.get(username).copied()
    }

    /// Binds a logged-in username to a session.
    pub fn bind(&mut self, id: ConnId, username: &str) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            warn!("Cannot bind {} to unknown connection {}", username, id);
            return false;
        };
        if let Some(old) = session.username.replace(username.to_string()) {
            self.by_username.remove(&old);
        }
        self.by_username.insert(username.to_string(), id);
        true
    }

    /// Forgets a username; the connection stays open.
    pub fn unbind(&mut self, username: &str) -> Option<ConnId> {
        let id = self.by_username.remove(username)?;
        if let Some(session) = self.sessions.get_mut(&id) {
            session.username = None;
        }
        Some(id)
    }

    /// Connections a message for `recipient` should be written to.
    pub fn resolve(&self, recipient: &Recipient) -> Vec<ConnId> {
        match recipient {
            Recipient::Player(name) => {
                let resolved: Vec<ConnId> = self.connection_for(name).into_iter().collect();
                if resolved.is_empty() {
                    warn!("No connection found for username {}", name);
                }
                resolved
            }
            Recipient::All => self.by_username.values().copied().collect(),
            Recipient::AllExcept(excluded) => self
                .by_username
                .iter()
                .filter(|(name, _)| *name != excluded)
                .map(|(_, id)| *id)
                .collect(),
            Recipient::Connection(id) => {
                if self.sessions.contains_key(id) {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Writes a frame to each connection, returning how many accepted it.
    pub fn deliver(&self, ids: &[ConnId], frame: &Bytes) -> usize {
        ids.iter()
            .filter_map(|id| self.sessions.get(id))
            .filter(|session| session.send(frame.clone()))
            .count()
    }

    pub fn logged_in(&self) -> usize {
        self.by_username.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
