// shopwire/src/session.rs

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use uuid::Uuid;

/// One authenticated session, owned exclusively by the [`SessionStore`].
/// Never persisted; wiped with the process.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    pub created_at: SystemTime,
    pub peer_addr: SocketAddr,
}

/// Process-wide session table shared by every connection handler.
///
/// All operations take the single inner lock, so create/get/delete are
/// atomic with respect to each other and no handler can observe a
/// half-written record. Session ids are random UUIDv4 tokens; collisions
/// are treated as cryptographically negligible.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `username` and return its id.
    pub fn create(&self, username: &str, peer_addr: SocketAddr) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            session_id: session_id.clone(),
            username: username.to_string(),
            created_at: SystemTime::now(),
            peer_addr,
        };
        let mut guard = self.inner.lock().unwrap();
        guard.insert(session_id.clone(), session);
        session_id
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        let guard = self.inner.lock().unwrap();
        guard.get(session_id).cloned()
    }

    /// Remove a session, returning the removed record if it existed.
    pub fn delete(&self, session_id: &str) -> Option<Session> {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the currently active session ids.
    pub fn ids(&self) -> Vec<String> {
        let guard = self.inner.lock().unwrap();
        guard.keys().cloned().collect()
    }
}
