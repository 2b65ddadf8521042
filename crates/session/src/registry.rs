//! Concurrent store of all live sessions, keyed by player UUID.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::session::Session;

/// Thread-safe registry of every session the proxy currently holds.
///
/// Lock-sharded via `DashMap`, so sessions registering and closing on
/// different tasks never contend on a single lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session under its UUID, replacing any older entry.
    pub fn register(&self, session: Arc<Session>) {
        self.sessions.insert(session.uuid(), session);
    }

    /// Remove `session`'s entry. An entry that has since been replaced by a
    /// newer session with the same UUID is left alone.
    pub fn unregister(&self, session: &Session) -> bool {
        self.sessions
            .remove_if(&session.uuid(), |_, stored| std::ptr::eq(Arc::as_ptr(stored), session))
            .is_some()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<Arc<Session>> {
        self.sessions.get(uuid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.sessions.contains_key(uuid)
    }

    /// Snapshot of all registered sessions.
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
